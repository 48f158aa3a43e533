//! Timeout helpers for blocking property access.
//!
//! Remote property access is the only operation with a timeout contract. On
//! expiry it fails with [`LipcError::Timeout`] and is never retried.

use std::future::Future;
use std::time::Duration;

use crate::error::{LipcError, Result};

/// Default property access timeout (10 s)
pub const DEFAULT_ACCESS_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Shortest access timeout accepted by configuration validation
pub const MIN_ACCESS_TIMEOUT: Duration = Duration::from_millis(10);

/// Longest access timeout accepted by configuration validation
pub const MAX_ACCESS_TIMEOUT: Duration = Duration::from_secs(600);

/// Run `future` with a deadline, mapping expiry to `LipcError::Timeout`
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(LipcError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_maps_to_lipc_error() {
        let result: Result<()> = with_timeout_error(
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(LipcError::Timeout)));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> =
            with_timeout_error(async { Err(LipcError::NoSuchProperty) }, DEFAULT_ACCESS_TIMEOUT)
                .await;
        assert!(matches!(result, Err(LipcError::NoSuchProperty)));
    }
}
