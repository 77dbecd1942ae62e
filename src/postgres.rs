use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgQueryResult, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo, ValueRef};
use std::sync::Arc;

use crate::{
    Context, ExecResult, Row, Runner, Transaction, TransactionBeginner, TransactionError,
    TransactionResult, TxOptions, Value,
};

/// PostgreSQL connection pool usable as a [`Runner`] that can begin transactions.
#[derive(Clone, Debug)]
pub struct PostgresDatabase {
    pool: Arc<PgPool>,
}

impl PostgresDatabase {
    /// Create a new PostgresDatabase with the given connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Runner for PostgresDatabase {
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
impl TransactionBeginner for PostgresDatabase {
    async fn begin_tx(
        &mut self,
        ctx: &Context,
        options: Option<&TxOptions>,
    ) -> TransactionResult<Box<dyn Transaction>> {
        let characteristics = options.and_then(set_transaction_sql);
        let tx = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                if let Some(sql) = &characteristics {
                    // Must be the first statement of the transaction.
                    sqlx::query(sql).execute(&mut *tx).await?;
                }
                Ok::<_, TransactionError>(tx)
            })
            .await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// An open PostgreSQL transaction.
///
/// Dropping it without calling `commit` or `rollback` rolls it back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Runner for PostgresTransaction {
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
impl Transaction for PostgresTransaction {
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

fn set_transaction_sql(options: &TxOptions) -> Option<String> {
    let mut modes = Vec::new();
    if let Some(level) = options.isolation.as_sql() {
        modes.push(format!("ISOLATION LEVEL {}", level));
    }
    if options.read_only {
        modes.push("READ ONLY".to_string());
    }
    if modes.is_empty() {
        return None;
    }
    Some(format!("SET TRANSACTION {}", modes.join(", ")))
}

// Value::Null is sent as a TEXT null; non-text columns need a cast in the SQL.
fn bind_args<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(*v),
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Blob(v) => query.bind(v.as_slice()),
            Value::Uuid(v) => query.bind(*v),
        };
    }
    query
}

fn exec_result(done: &PgQueryResult) -> ExecResult {
    ExecResult {
        rows_affected: done.rows_affected(),
        last_insert_id: None,
    }
}

fn decode_row(row: &PgRow) -> TransactionResult<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "BOOL" => Value::Bool(row.try_get(idx)?),
                "INT2" => Value::Integer(i64::from(row.try_get::<i16, _>(idx)?)),
                "INT4" => Value::Integer(i64::from(row.try_get::<i32, _>(idx)?)),
                "INT8" => Value::Integer(row.try_get(idx)?),
                "FLOAT4" => Value::Real(f64::from(row.try_get::<f32, _>(idx)?)),
                "FLOAT8" => Value::Real(row.try_get(idx)?),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::Text(row.try_get(idx)?),
                "BYTEA" => Value::Blob(row.try_get(idx)?),
                "UUID" => Value::Uuid(row.try_get(idx)?),
                _ => return Err(TransactionError::UnsupportedType(type_name)),
            }
        };
        columns.push(column.name().to_string());
        values.push(value);
    }
    Ok(Row::new(columns, values))
}
