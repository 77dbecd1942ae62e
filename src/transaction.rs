use std::panic::{self, AssertUnwindSafe};

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::panic_message;
use crate::{Context, Runner, TransactionError, TxOptions};

/// Runs `work` inside a single database transaction.
///
/// If `runner` is already an open transaction, `work` runs on it directly and
/// its result is returned as is; whoever opened that transaction decides
/// whether it commits. Otherwise a new transaction is started and:
///
/// * `work` returns `Ok` → the transaction is committed and the commit result returned.
/// * `work` returns `Err` → the transaction is rolled back and the error returned
///   unchanged. If the rollback fails too, both failures are returned together
///   as [`TransactionError::RollbackAfterError`].
/// * `work` panics → the transaction is rolled back and the panic resumed. If the
///   rollback fails, the resumed panic carries a
///   [`TransactionError::RollbackAfterPanic`] payload instead.
///
/// ```no_run
/// # use tx_runner::{run_in_transaction, Context, Runner, SqliteDatabase, TransactionError};
/// # async fn demo(db: &mut SqliteDatabase) -> Result<(), TransactionError> {
/// let ctx = Context::background();
/// run_in_transaction(&ctx, db, |tx| {
///     let ctx = ctx.clone();
///     Box::pin(async move {
///         tx.execute(&ctx, "INSERT INTO users (name) VALUES (?1)", &["John".into()]).await?;
///         tx.execute(&ctx, "INSERT INTO users (name) VALUES (?1)", &["Jane".into()]).await?;
///         Ok::<_, TransactionError>(())
///     })
/// })
/// .await
/// # }
/// ```
pub async fn run_in_transaction<F, T, E>(ctx: &Context, runner: &mut dyn Runner, work: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut dyn Runner) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: From<TransactionError> + std::error::Error + Send + Sync + 'static,
{
    run_in_transaction_with(ctx, runner, None, work).await
}

/// Same as [`run_in_transaction`], forwarding `options` to `begin_tx` when a
/// new transaction has to be started. Ignored in the nested case.
pub async fn run_in_transaction_with<F, T, E>(
    ctx: &Context,
    runner: &mut dyn Runner,
    options: Option<&TxOptions>,
    work: F,
) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut dyn Runner) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: From<TransactionError> + std::error::Error + Send + Sync + 'static,
{
    if runner.as_transaction().is_some() {
        log::debug!("reusing open transaction");
        return work(runner).await;
    }

    let Some(beginner) = runner.as_beginner() else {
        return Err(TransactionError::NotTransactional.into());
    };

    let mut tx = beginner
        .begin_tx(ctx, options)
        .await
        .map_err(|err| TransactionError::BeginFailed(Box::new(err)))?;
    log::debug!("transaction started");

    // Calling `work` happens inside the guarded future so a panic raised
    // before it returns its future still rolls back.
    let runner = tx.as_runner();
    let outcome = AssertUnwindSafe(async move { work(runner).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(value)) => {
            tx.commit().await?;
            log::debug!("transaction committed");
            Ok(value)
        }
        Ok(Err(err)) => match tx.rollback().await {
            Ok(()) => {
                log::debug!("transaction rolled back: {}", err);
                Err(err)
            }
            Err(rollback) => {
                log::warn!("rollback failed after error: {}, rollback error: {}", err, rollback);
                Err(TransactionError::RollbackAfterError {
                    error: Box::new(err),
                    rollback: Box::new(rollback),
                }
                .into())
            }
        },
        Err(payload) => match tx.rollback().await {
            Ok(()) => {
                log::debug!("transaction rolled back after panic");
                panic::resume_unwind(payload)
            }
            Err(rollback) => {
                let panic = panic_message(payload.as_ref());
                log::warn!("rollback failed after panic: {}, rollback error: {}", panic, rollback);
                panic::resume_unwind(Box::new(TransactionError::RollbackAfterPanic {
                    panic,
                    rollback: Box::new(rollback),
                }))
            }
        },
    }
}
