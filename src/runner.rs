use async_trait::async_trait;

use crate::{Context, ExecResult, Row, TransactionResult, Value};

/// Minimal capability needed to run statements against a database.
///
/// Plain database handles and open transactions both implement `Runner`.
/// The capability queries let [`run_in_transaction`](crate::run_in_transaction)
/// tell the two apart at runtime.
#[async_trait]
pub trait Runner: Send {
    /// Execute a statement that returns no rows.
    async fn execute(
        &mut self,
        ctx: &Context,
        sql: &str,
        args: &[Value],
    ) -> TransactionResult<ExecResult>;

    /// Execute a query and collect its rows.
    async fn query(&mut self, ctx: &Context, sql: &str, args: &[Value])
        -> TransactionResult<Vec<Row>>;

    /// First row of a query, if any.
    async fn query_one(
        &mut self,
        ctx: &Context,
        sql: &str,
        args: &[Value],
    ) -> TransactionResult<Option<Row>> {
        Ok(self.query(ctx, sql, args).await?.into_iter().next())
    }

    /// `Some` when this runner is an open transaction.
    fn as_transaction(&mut self) -> Option<&mut dyn Transaction> {
        None
    }

    /// `Some` when this runner can start transactions.
    fn as_beginner(&mut self) -> Option<&mut dyn TransactionBeginner> {
        None
    }
}

/// A runner that can start new transactions.
#[async_trait]
pub trait TransactionBeginner: Runner {
    /// Begin a new transaction. `None` means driver defaults.
    async fn begin_tx(
        &mut self,
        ctx: &Context,
        options: Option<&TxOptions>,
    ) -> TransactionResult<Box<dyn Transaction>>;
}

/// An open transaction.
///
/// `commit` and `rollback` consume the handle, so a transaction is finished
/// exactly once.
#[async_trait]
pub trait Transaction: Runner {
    /// View this transaction as a plain runner for units of work.
    fn as_runner(&mut self) -> &mut dyn Runner;

    /// Make every statement run on this transaction durable and visible.
    async fn commit(self: Box<Self>) -> TransactionResult<()>;

    /// Discard every statement run on this transaction.
    async fn rollback(self: Box<Self>) -> TransactionResult<()>;
}

/// Isolation level requested when a transaction begins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Whatever the driver uses by default.
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling, `None` for [`IsolationLevel::Default`].
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            IsolationLevel::Default => None,
            IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
            IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
            IsolationLevel::Serializable => Some("SERIALIZABLE"),
        }
    }
}

/// Options forwarded to [`TransactionBeginner::begin_tx`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TxOptions {
    /// Default isolation, read-write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level.
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Request a read-only transaction.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
