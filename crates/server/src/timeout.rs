// Deadline for storage calls.
//
// A call that exceeds its bound fails with `FolioError::Timeout` and is not
// retried. The underlying future is dropped, which rolls back any open
// transaction it holds.

use std::{future::Future, time::Duration};

use tracing::warn;

use crate::error::FolioError;

/// Default bound for a single storage call.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(8);

pub async fn bounded<T, F>(limit: Duration, operation: &'static str, future: F) -> Result<T, FolioError>
where
    F: Future<Output = Result<T, FolioError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = limit.as_millis() as u64, "storage call timed out");
            Err(FolioError::Timeout(operation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fast_call_passes_through() {
        let value = bounded(Duration::from_secs(1), "fast", async { Ok::<_, FolioError>(7) })
            .await
            .expect("fast call should succeed");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn inner_error_is_preserved() {
        let error = bounded(Duration::from_secs(1), "missing", async {
            Err::<(), _>(FolioError::NotFound("page"))
        })
        .await
        .expect_err("inner error should surface");
        assert!(matches!(error, FolioError::NotFound("page")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let error = bounded(Duration::from_secs(8), "slow", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, FolioError>(())
        })
        .await
        .expect_err("slow call should time out");
        assert!(matches!(error, FolioError::Timeout("slow")));
    }
}
