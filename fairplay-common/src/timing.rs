//! Cancellable timing helpers
//!
//! Every sleep in the engine must observe cancellation; a stopped sorter
//! should not linger for the remainder of a 30-second poll interval.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Sleep for `duration`, returning `Err(Error::Cancelled)` as soon as the
/// token is cancelled.
pub async fn sleep(duration: Duration, cancel_token: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel_token.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Bail out with `Err(Error::Cancelled)` when the token has been cancelled.
///
/// Placed before each unit of work so a cancelled run stops at the next
/// suspension point instead of finishing the cycle.
pub fn ensure_active(cancel_token: &CancellationToken) -> Result<()> {
    if cancel_token.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let token = CancellationToken::new();
        assert!(sleep(Duration::from_secs(5), &token).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_observes_cancellation() {
        let token = CancellationToken::new();
        let sleeper = tokio::spawn({
            let token = token.clone();
            async move { sleep(Duration::from_secs(3600), &token).await }
        });

        token.cancel();
        let result = sleeper.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_ensure_active() {
        let token = CancellationToken::new();
        assert!(ensure_active(&token).is_ok());

        token.cancel();
        assert!(matches!(ensure_active(&token), Err(Error::Cancelled)));
    }
}
