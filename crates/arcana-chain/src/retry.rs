//! Retry with exponential backoff for idempotent JSON-RPC reads.
//!
//! Only transport failures are retried. Node rejections and malformed
//! responses return immediately. Never wrap `eth_sendRawTransaction` in this.

use std::future::Future;
use std::time::Duration;

use crate::error::RpcError;

/// Retry attempts after the initial call.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries (200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

pub(crate) async fn retry_read<T, F, Fut>(method: &str, f: F) -> Result<T, RpcError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    for attempt in 0..MAX_RETRIES {
        match f().await {
            Err(e) if e.is_transient() => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(
                    method,
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    "JSON-RPC read failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
    f().await
}
