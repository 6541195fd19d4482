//! Deadline wrapper for submission steps.
//!
//! [`with_timeout`] stops *waiting* for an operation; it never cancels it.
//! The operation runs as its own task, so a request that already reached a
//! node or bundler may still land after the caller saw a timeout. Anything
//! retried after a timeout must be treated as a possible duplicate.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{ErrorEnvelope, SubmissionError};

/// Race `operation` against `limit`.
///
/// On expiry fails with [`SubmissionError::Timeout`] carrying `message`. The
/// deadline timer is owned by this call and dropped on both paths.
pub async fn with_timeout<F>(
    operation: F,
    limit: Duration,
    message: impl Into<String>,
) -> Result<F::Output, SubmissionError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = tokio::spawn(operation);

    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(join_error)) => Err(SubmissionError::Unknown(ErrorEnvelope::new(format!(
            "operation aborted: {}",
            join_error
        )))),
        Err(_) => {
            let message = message.into();
            debug!("Stopped waiting after {:?}: {}", limit, message);
            // dropping the JoinHandle detaches the task, it keeps running
            Err(SubmissionError::Timeout(message))
        }
    }
}
