//! Long-polling loop feeding the session manager

use super::{Inbound, SessionManager};
use crate::telegram::{TelegramClient, TelegramError, TelegramErrorKind};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Poll for updates until `cancel` fires
pub async fn run_polling(
    client: &TelegramClient,
    manager: &SessionManager,
    cancel: CancellationToken,
) {
    let mut offset = 0;
    let mut failures: u32 = 0;
    tracing::info!("Polling for updates");

    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = client.get_updates(offset) => result,
        };

        match result {
            Ok(updates) => {
                failures = 0;
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    match Inbound::from_update(update) {
                        Some(inbound) => manager.dispatch(inbound).await,
                        None => tracing::debug!(offset, "Skipping unsupported update"),
                    }
                }
            }
            Err(e) => {
                failures += 1;
                let delay = backoff(&e, failures);
                if e.kind == TelegramErrorKind::Auth {
                    tracing::error!(error = %e, "Bot token rejected");
                } else {
                    tracing::warn!(
                        error = %e,
                        retryable = e.kind.is_retryable(),
                        delay_secs = delay.as_secs(),
                        "getUpdates failed"
                    );
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    tracing::info!("Polling stopped");
}

/// Server-provided `retry_after`, else 1s doubling per failure up to 30s
fn backoff(error: &TelegramError, failures: u32) -> Duration {
    error.retry_after.unwrap_or_else(|| {
        let exp = failures.saturating_sub(1).min(5);
        Duration::from_secs(1 << exp).min(MAX_BACKOFF)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let err = TelegramError::new(TelegramErrorKind::Network, "down");
        assert_eq!(backoff(&err, 1), Duration::from_secs(1));
        assert_eq!(backoff(&err, 2), Duration::from_secs(2));
        assert_eq!(backoff(&err, 4), Duration::from_secs(8));
        assert_eq!(backoff(&err, 6), MAX_BACKOFF);
        assert_eq!(backoff(&err, 50), MAX_BACKOFF);
    }

    #[test]
    fn test_backoff_honors_retry_after() {
        let err = TelegramError::from_api(429, "slow down", Some(12));
        assert_eq!(backoff(&err, 1), Duration::from_secs(12));
    }
}
