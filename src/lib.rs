//! Transaction runner
//!
//! Wraps "begin → run caller logic → commit or roll back" into a single call,
//! [`run_in_transaction`], over any handle implementing the [`Runner`] traits.
//! Calls made with an already-open transaction reuse it, so nested units of
//! work collapse into one database transaction.

pub mod config;
pub mod context;
pub mod error;
pub mod postgres;
pub mod runner;
pub mod sqlite;
pub mod transaction;
pub mod value;

pub use config::DatabaseConfig;
pub use context::{CancelHandle, Context};
pub use error::{BoxError, TransactionError, TransactionResult};
pub use postgres::{PostgresDatabase, PostgresTransaction};
pub use runner::{IsolationLevel, Runner, Transaction, TransactionBeginner, TxOptions};
pub use sqlite::{SqliteDatabase, SqliteTransaction};
pub use transaction::{run_in_transaction, run_in_transaction_with};
pub use value::{ExecResult, Row, Value};
