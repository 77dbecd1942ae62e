use uuid::Uuid;

use tx_runner::{Context, Runner, TransactionResult, Value};

use super::entities::{Order, User};

/// Placeholder style of the backend under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Statements are written with `$n` placeholders; SQLite gets `?n`.
    pub fn sql(&self, statement: &str) -> String {
        match self {
            Dialect::Sqlite => statement.replace('$', "?"),
            Dialect::Postgres => statement.to_string(),
        }
    }

    fn id(&self, id: Uuid) -> Value {
        match self {
            Dialect::Sqlite => Value::Text(id.to_string()),
            Dialect::Postgres => Value::Uuid(id),
        }
    }
}

pub async fn create_tables(ctx: &Context, runner: &mut dyn Runner, dialect: Dialect) -> TransactionResult<()> {
    let id_type = match dialect {
        Dialect::Sqlite => "TEXT",
        Dialect::Postgres => "UUID",
    };
    runner
        .execute(
            ctx,
            &format!(
                "CREATE TABLE IF NOT EXISTS users (
                    id {id_type} PRIMARY KEY,
                    name VARCHAR(255) NOT NULL,
                    email VARCHAR(255) UNIQUE NOT NULL
                )"
            ),
            &[],
        )
        .await?;
    runner
        .execute(
            ctx,
            &format!(
                "CREATE TABLE IF NOT EXISTS orders (
                    id {id_type} PRIMARY KEY,
                    user_id {id_type} NOT NULL REFERENCES users(id),
                    product_name VARCHAR(255) NOT NULL,
                    amount BIGINT NOT NULL
                )"
            ),
            &[],
        )
        .await?;
    Ok(())
}

pub async fn drop_tables(ctx: &Context, runner: &mut dyn Runner) -> TransactionResult<()> {
    runner.execute(ctx, "DROP TABLE IF EXISTS orders", &[]).await?;
    runner.execute(ctx, "DROP TABLE IF EXISTS users", &[]).await?;
    Ok(())
}

/// User queries issued through whichever runner the caller holds
#[derive(Debug, Clone)]
pub struct UserRepository {
    ctx: Context,
    dialect: Dialect,
}

impl UserRepository {
    pub fn new(ctx: Context, dialect: Dialect) -> Self {
        Self { ctx, dialect }
    }

    pub async fn create(&self, runner: &mut dyn Runner, user: &User) -> TransactionResult<()> {
        runner
            .execute(
                &self.ctx,
                &self.dialect.sql("INSERT INTO users (id, name, email) VALUES ($1, $2, $3)"),
                &[
                    self.dialect.id(user.id),
                    user.name.as_str().into(),
                    user.email.as_str().into(),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, runner: &mut dyn Runner, id: Uuid) -> TransactionResult<Option<User>> {
        let row = runner
            .query_one(
                &self.ctx,
                &self.dialect.sql("SELECT id, name, email FROM users WHERE id = $1"),
                &[self.dialect.id(id)],
            )
            .await?;
        Ok(row.as_ref().and_then(User::from_row))
    }

    pub async fn find_name_by_email(
        &self,
        runner: &mut dyn Runner,
        email: &str,
    ) -> TransactionResult<Option<String>> {
        let row = runner
            .query_one(
                &self.ctx,
                &self.dialect.sql("SELECT name FROM users WHERE email = $1"),
                &[email.into()],
            )
            .await?;
        Ok(row.and_then(|r| r.get("name").and_then(Value::as_str).map(str::to_string)))
    }

    pub async fn count(&self, runner: &mut dyn Runner) -> TransactionResult<i64> {
        count(&self.ctx, runner, "users").await
    }
}

/// Order queries issued through whichever runner the caller holds
#[derive(Debug, Clone)]
pub struct OrderRepository {
    ctx: Context,
    dialect: Dialect,
}

impl OrderRepository {
    pub fn new(ctx: Context, dialect: Dialect) -> Self {
        Self { ctx, dialect }
    }

    pub async fn create(&self, runner: &mut dyn Runner, order: &Order) -> TransactionResult<()> {
        runner
            .execute(
                &self.ctx,
                &self.dialect.sql(
                    "INSERT INTO orders (id, user_id, product_name, amount) VALUES ($1, $2, $3, $4)",
                ),
                &[
                    self.dialect.id(order.id),
                    self.dialect.id(order.user_id),
                    order.product_name.as_str().into(),
                    order.amount.into(),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn count(&self, runner: &mut dyn Runner) -> TransactionResult<i64> {
        count(&self.ctx, runner, "orders").await
    }
}

async fn count(ctx: &Context, runner: &mut dyn Runner, table: &str) -> TransactionResult<i64> {
    let row = runner
        .query_one(ctx, &format!("SELECT COUNT(*) AS count FROM {table}"), &[])
        .await?;
    Ok(row
        .and_then(|r| r.get("count").and_then(Value::as_i64))
        .unwrap_or_default())
}
