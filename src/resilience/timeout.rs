//! Timeout helper for agent attempts.

use std::future::Future;
use std::time::Duration;

use crate::types::{PalmerError, Result};

/// Execute an async operation with a timeout
///
/// Returns [`PalmerError::Timeout`] if the operation doesn't complete within
/// `timeout`. The future is dropped on expiry.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(PalmerError::timeout(operation_name, timeout)),
    }
}
