//! Inserts a user and reads it back inside one transaction.
//!
//! Uses `DATABASE_URL` when set to a `sqlite:` URL, an in-memory database otherwise:
//! `RUST_LOG=debug cargo run --example quickstart`

use tx_runner::{run_in_transaction, Context, DatabaseConfig, Runner, TransactionError, Value};

#[tokio::main]
async fn main() -> Result<(), TransactionError> {
    env_logger::init();

    let config = match DatabaseConfig::from_env() {
        Ok(config) if config.url.starts_with("sqlite:") => config,
        _ => DatabaseConfig::sqlite_memory(),
    };
    let ctx = Context::background();
    let mut db = config.connect_sqlite().await?;

    db.execute(
        &ctx,
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL
        )",
        &[],
    )
    .await?;

    let name = run_in_transaction(&ctx, &mut db, |tx| {
        let ctx = ctx.clone();
        Box::pin(async move {
            tx.execute(
                &ctx,
                "INSERT INTO users (name, email) VALUES (?1, ?2)",
                &[Value::from("John"), Value::from("john@gmail.com")],
            )
            .await?;

            let row = tx
                .query_one(&ctx, "SELECT name FROM users WHERE email = ?1", &["john@gmail.com".into()])
                .await?
                .ok_or_else(|| TransactionError::Aborted("user not found".to_string()))?;
            let name = row.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            Ok::<_, TransactionError>(name)
        })
    })
    .await?;

    println!("successfully inserted user {name} inside transaction");
    Ok(())
}
