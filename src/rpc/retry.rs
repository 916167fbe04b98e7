//! Retry policy and RPC error classification.

use std::future::Future;
use std::time::Duration;

use crate::errors::{DexResult, RpcError};
use crate::logger::{log, LogTag};

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 100;

/// Recognize provider rate limiting and transient transport failures.
pub fn is_rate_limit_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("too many requests")
        || message.contains("rate limit")
        || message.contains("429")
        || message.contains("quota exceeded")
        || message.contains("timeout")
        || message.contains("connection reset")
}

/// Recognize the provider's "no such account" responses.
pub fn is_account_not_found_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("account not found")
        || message.contains("could not find account")
        || message.contains("invalid param")
}

/// Run `op`, retrying rate-limited and transient failures with exponential
/// backoff (100ms, 200ms, 400ms). Exhausted retries surface as permanent.
pub async fn with_backoff<T, F, Fut>(label: &str, mut op: F) -> DexResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, solana_client::client_error::ClientError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let message = err.to_string();
                if is_account_not_found_error(&message) {
                    return Err(RpcError::AccountNotFound(message).into());
                }
                if is_rate_limit_error(&message) {
                    if attempt < MAX_RETRIES {
                        let delay = BASE_DELAY_MS << attempt;
                        log(
                            LogTag::Rpc,
                            "WARN",
                            &format!("{} rate limited, retrying in {}ms", label, delay),
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(RpcError::Permanent(format!(
                        "{} failed after {} attempts: {}",
                        label,
                        attempt + 1,
                        message
                    ))
                    .into());
                }
                return Err(RpcError::Permanent(format!("{}: {}", label, message)).into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        assert!(is_rate_limit_error("HTTP status client error (429 Too Many Requests)"));
        assert!(is_rate_limit_error("request timeout"));
        assert!(is_rate_limit_error("Connection reset by peer"));
        assert!(!is_rate_limit_error("instruction error"));
    }

    #[test]
    fn test_account_not_found_classification() {
        assert!(is_account_not_found_error("Account not found"));
        assert!(is_account_not_found_error("could not find account xyz"));
        assert!(!is_account_not_found_error("rate limit"));
    }
}
