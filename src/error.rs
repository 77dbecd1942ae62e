use std::any::Any;

/// Boxed caller error kept alongside a failed rollback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for transaction operations
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("provided runner cannot begin transactions")]
    NotTransactional,

    #[error("error starting transaction: {0}")]
    BeginFailed(#[source] Box<TransactionError>),

    /// The unit of work failed and the compensating rollback failed too.
    /// `error` is the original failure, `rollback` the rollback failure.
    #[error("unable to rollback after error: {error}, rollback error: {rollback}")]
    RollbackAfterError {
        error: BoxError,
        #[source]
        rollback: Box<TransactionError>,
    },

    /// Panic payload used when a panicking unit of work could not be rolled back.
    #[error("unable to rollback after panic with value: {panic}, rollback error: {rollback}")]
    RollbackAfterPanic {
        panic: String,
        #[source]
        rollback: Box<TransactionError>,
    },

    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("unsupported transaction option: {0}")]
    UnsupportedOption(String),

    #[error("unsupported column type: {0}")]
    UnsupportedType(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Aborted(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl TransactionError {
    /// Returns the underlying driver error, looking through `BeginFailed`.
    pub fn as_database_error(&self) -> Option<&sqlx::Error> {
        match self {
            TransactionError::DatabaseError(err) => Some(err),
            TransactionError::BeginFailed(inner) => inner.as_database_error(),
            _ => None,
        }
    }

    /// True when the driver reported a unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self.as_database_error(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    }
}

/// Result type for transaction operations
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Renders a panic payload the way the standard panic hook does.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(err) = payload.downcast_ref::<TransactionError>() {
        err.to_string()
    } else {
        "Box<dyn Any>".to_string()
    }
}
