use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteQueryResult, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};
use std::sync::Arc;

use crate::{
    Context, ExecResult, IsolationLevel, Row, Runner, Transaction, TransactionBeginner,
    TransactionError, TransactionResult, TxOptions, Value,
};

/// SQLite connection pool usable as a [`Runner`] that can begin transactions.
#[derive(Clone, Debug)]
pub struct SqliteDatabase {
    pool: Arc<SqlitePool>,
}

impl SqliteDatabase {
    /// Create a new SqliteDatabase with the given connection pool.
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Runner for SqliteDatabase {
    async fn execute(
        &mut self,
        ctx: &Context,
        sql: &str,
        args: &[Value],
    ) -> TransactionResult<ExecResult> {
        ctx.run(async {
            let done = bind_args(sqlx::query(sql), args)
                .execute(&*self.pool)
                .await?;
            Ok::<_, TransactionError>(exec_result(&done))
        })
        .await
    }

    async fn query(
        &mut self,
        ctx: &Context,
        sql: &str,
        args: &[Value],
    ) -> TransactionResult<Vec<Row>> {
        ctx.run(async {
            let rows = bind_args(sqlx::query(sql), args)
                .fetch_all(&*self.pool)
                .await?;
            rows.iter().map(decode_row).collect::<TransactionResult<Vec<Row>>>()
        })
        .await
    }

    fn as_beginner(&mut self) -> Option<&mut dyn TransactionBeginner> {
        Some(self)
    }
}

#[async_trait]
impl TransactionBeginner for SqliteDatabase {
    async fn begin_tx(
        &mut self,
        ctx: &Context,
        options: Option<&TxOptions>,
    ) -> TransactionResult<Box<dyn Transaction>> {
        if let Some(options) = options {
            check_options(options)?;
        }
        let tx = ctx
            .run(async { Ok::<_, TransactionError>(self.pool.begin().await?) })
            .await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

/// An open SQLite transaction.
///
/// Dropping it without calling `commit` or `rollback` rolls it back.
pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl Runner for SqliteTransaction {
    async fn execute(
        &mut self,
        ctx: &Context,
        sql: &str,
        args: &[Value],
    ) -> TransactionResult<ExecResult> {
        ctx.run(async {
            let done = bind_args(sqlx::query(sql), args)
                .execute(&mut *self.tx)
                .await?;
            Ok::<_, TransactionError>(exec_result(&done))
        })
        .await
    }

    async fn query(
        &mut self,
        ctx: &Context,
        sql: &str,
        args: &[Value],
    ) -> TransactionResult<Vec<Row>> {
        ctx.run(async {
            let rows = bind_args(sqlx::query(sql), args)
                .fetch_all(&mut *self.tx)
                .await?;
            rows.iter().map(decode_row).collect::<TransactionResult<Vec<Row>>>()
        })
        .await
    }

    fn as_transaction(&mut self) -> Option<&mut dyn Transaction> {
        Some(self)
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    fn as_runner(&mut self) -> &mut dyn Runner {
        self
    }

    async fn commit(self: Box<Self>) -> TransactionResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> TransactionResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// SQLite transactions are always serializable and cannot be opened read-only.
fn check_options(options: &TxOptions) -> TransactionResult<()> {
    match options.isolation {
        IsolationLevel::Default | IsolationLevel::Serializable => {}
        other => {
            return Err(TransactionError::UnsupportedOption(format!(
                "sqlite does not support isolation level {:?}",
                other
            )))
        }
    }
    if options.read_only {
        return Err(TransactionError::UnsupportedOption(
            "sqlite does not support read-only transactions".to_string(),
        ));
    }
    Ok(())
}

fn bind_args<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &'q [Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<i64>),
            Value::Bool(v) => query.bind(*v),
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Blob(v) => query.bind(v.as_slice()),
            Value::Uuid(v) => query.bind(v.to_string()),
        };
    }
    query
}

fn exec_result(done: &SqliteQueryResult) -> ExecResult {
    ExecResult {
        rows_affected: done.rows_affected(),
        last_insert_id: Some(done.last_insert_rowid()),
    }
}

// Storage classes are read from each value, not from the declared column type.
fn decode_row(row: &SqliteRow) -> TransactionResult<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" => Value::Integer(row.try_get(idx)?),
                "REAL" => Value::Real(row.try_get(idx)?),
                "TEXT" => Value::Text(row.try_get(idx)?),
                "BLOB" => Value::Blob(row.try_get(idx)?),
                "BOOLEAN" => Value::Bool(row.try_get(idx)?),
                _ => return Err(TransactionError::UnsupportedType(type_name)),
            }
        };
        columns.push(column.name().to_string());
        values.push(value);
    }
    Ok(Row::new(columns, values))
}
