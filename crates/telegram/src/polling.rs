use std::future::Future;
use std::time::Duration;

use crate::client::{POLL_TIMEOUT_SECS, TelegramClient};
use crate::dispatcher::Dispatcher;
use crate::error::TelegramError;

const ERROR_BACKOFF: Duration = Duration::from_secs(3);

/// Long-polls `getUpdates` and hands every update to `dispatcher` until
/// `shutdown` resolves. Any registered webhook is removed first, since the
/// API refuses `getUpdates` while one is set.
///
/// # Errors
/// Returns an error only if the webhook cannot be removed at startup.
pub async fn run_polling(
    client: &TelegramClient,
    dispatcher: &Dispatcher,
    shutdown: impl Future<Output = ()>,
) -> Result<(), TelegramError> {
    client.delete_webhook().await?;
    tracing::info!("Starting long polling");

    tokio::pin!(shutdown);
    let mut offset: Option<i64> = None;
    loop {
        let updates = tokio::select! {
            () = &mut shutdown => {
                tracing::info!("Polling stopped");
                return Ok(());
            },
            result = client.get_updates(offset, POLL_TIMEOUT_SECS) => result,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id.saturating_add(1));
                    dispatcher.dispatch_update(update);
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed");
                tokio::time::sleep(ERROR_BACKOFF).await;
            },
        }
    }
}
