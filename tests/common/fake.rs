use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use tx_runner::{
    Context, ExecResult, Row, Runner, Transaction, TransactionBeginner, TransactionError,
    TransactionResult, TxOptions, Value,
};

/// Statement that never completes on its own; only the context can end it.
pub const STALL: &str = "STALL";

/// Failures the fake engine injects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub begin: bool,
    pub commit: bool,
    pub rollback: bool,
}

/// In-memory engine that records every call instead of touching a database
#[derive(Clone, Default)]
pub struct FakeDatabase {
    calls: Arc<Mutex<Vec<String>>>,
    options: Arc<Mutex<Vec<Option<TxOptions>>>>,
    faults: Faults,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    /// Options received by each `begin_tx`, in order.
    pub fn begin_options(&self) -> Vec<Option<TxOptions>> {
        self.options.lock().clone()
    }
}

#[async_trait]
impl Runner for FakeDatabase {
    async fn execute(&mut self, _ctx: &Context, sql: &str, _args: &[Value]) -> TransactionResult<ExecResult> {
        self.calls.lock().push(format!("db: {sql}"));
        Ok(ExecResult::default())
    }

    async fn query(&mut self, _ctx: &Context, sql: &str, _args: &[Value]) -> TransactionResult<Vec<Row>> {
        self.calls.lock().push(format!("db: {sql}"));
        Ok(Vec::new())
    }

    fn as_beginner(&mut self) -> Option<&mut dyn TransactionBeginner> {
        Some(self)
    }
}

#[async_trait]
impl TransactionBeginner for FakeDatabase {
    async fn begin_tx(
        &mut self,
        _ctx: &Context,
        options: Option<&TxOptions>,
    ) -> TransactionResult<Box<dyn Transaction>> {
        self.calls.lock().push("begin".to_string());
        self.options.lock().push(options.copied());
        if self.faults.begin {
            return Err(TransactionError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        Ok(Box::new(FakeTransaction {
            calls: self.calls.clone(),
            faults: self.faults,
        }))
    }
}

pub struct FakeTransaction {
    calls: Arc<Mutex<Vec<String>>>,
    faults: Faults,
}

#[async_trait]
impl Runner for FakeTransaction {
    async fn execute(&mut self, ctx: &Context, sql: &str, _args: &[Value]) -> TransactionResult<ExecResult> {
        self.calls.lock().push(format!("tx: {sql}"));
        if sql == STALL {
            return ctx.run(std::future::pending()).await;
        }
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn query(&mut self, _ctx: &Context, sql: &str, _args: &[Value]) -> TransactionResult<Vec<Row>> {
        self.calls.lock().push(format!("tx: {sql}"));
        Ok(vec![Row::new(vec!["n".to_string()], vec![Value::Integer(1)])])
    }

    fn as_transaction(&mut self) -> Option<&mut dyn Transaction> {
        Some(self)
    }
}

#[async_trait]
impl Transaction for FakeTransaction {
    fn as_runner(&mut self) -> &mut dyn Runner {
        self
    }

    async fn commit(self: Box<Self>) -> TransactionResult<()> {
        self.calls.lock().push("commit".to_string());
        if self.faults.commit {
            return Err(TransactionError::Aborted("commit refused".to_string()));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> TransactionResult<()> {
        self.calls.lock().push("rollback".to_string());
        if self.faults.rollback {
            return Err(TransactionError::Aborted("connection lost".to_string()));
        }
        Ok(())
    }
}

/// Runner that can execute statements but cannot begin transactions
#[derive(Clone, Default)]
pub struct PlainRunner {
    pub executed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Runner for PlainRunner {
    async fn execute(&mut self, _ctx: &Context, sql: &str, _args: &[Value]) -> TransactionResult<ExecResult> {
        self.executed.lock().push(sql.to_string());
        Ok(ExecResult::default())
    }

    async fn query(&mut self, _ctx: &Context, sql: &str, _args: &[Value]) -> TransactionResult<Vec<Row>> {
        self.executed.lock().push(sql.to_string());
        Ok(Vec::new())
    }
}
