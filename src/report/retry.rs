use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    api::{ApiError, SessionClient},
    models::{GazeResult, ResultFetch},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetryError {
    #[error("result still processing after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error(transparent)]
    Transport(#[from] ApiError),
    #[error("result retrieval cancelled")]
    Cancelled,
}

/// Fetch a finished result, waiting out the backend's write latency.
///
/// Only the 202 "still processing" answer is retried, at most
/// `policy.max_attempts` requests in total with a fixed delay in between.
/// Any other failure ends the loop on the spot.
pub async fn fetch_result_with_retry<C: SessionClient>(
    client: &C,
    child_id: &str,
    policy: &RetryPolicy,
    cancel_token: &CancellationToken,
) -> Result<GazeResult, RetryError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        if cancel_token.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        attempt += 1;

        let fetched = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(RetryError::Cancelled),
            fetched = client.get_result(child_id) => fetched,
        };

        match fetched {
            Ok(ResultFetch::Ready(result)) => {
                log_debug!("result for child {child_id} ready on attempt {attempt}");
                return Ok(result);
            }
            Ok(ResultFetch::Processing) if attempt >= max_attempts => {
                log_warn!("result for child {child_id} still processing after {attempt} attempts");
                return Err(RetryError::Exhausted { attempts: attempt });
            }
            Ok(ResultFetch::Processing) => {
                log_debug!(
                    "result for child {child_id} still processing (attempt {attempt}/{max_attempts})"
                );
            }
            Err(err) => {
                log_warn!("result fetch for child {child_id} failed: {err}");
                return Err(RetryError::Transport(err));
            }
        }

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{sample_result, server_error, FakeSessionClient};
    use std::sync::Arc;
    use tokio::time::{sleep, Instant};

    fn processing(times: usize) -> Vec<Result<ResultFetch, ApiError>> {
        (0..times).map(|_| Ok(ResultFetch::Processing)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn tenth_attempt_returns_the_result() {
        let mut answers = processing(9);
        answers.push(Ok(ResultFetch::Ready(sample_result("C2"))));
        let client = FakeSessionClient::new().with_results(answers);

        let started = Instant::now();
        let result = fetch_result_with_retry(
            &client,
            "C2",
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.child_id, "C2");
        assert_eq!(client.result_calls(), 10);
        assert_eq!(started.elapsed(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_ten_processing_answers() {
        let client = FakeSessionClient::new().with_results(processing(11));

        let err = fetch_result_with_retry(
            &client,
            "C3",
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err, RetryError::Exhausted { attempts: 10 });
        assert_eq!(client.result_calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_never_retried() {
        let client = FakeSessionClient::new().with_results(vec![
            Err(server_error()),
            Ok(ResultFetch::Ready(sample_result("C1"))),
        ]);

        let err = fetch_result_with_retry(
            &client,
            "C1",
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RetryError::Transport(ApiError::Status { status: 500, .. })));
        assert_eq!(client.result_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_attempts() {
        let client = Arc::new(FakeSessionClient::new().with_results(processing(20)));
        let token = CancellationToken::new();

        let task = tokio::spawn({
            let client = client.clone();
            let token = token.clone();
            async move {
                fetch_result_with_retry(&*client, "C5", &RetryPolicy::default(), &token).await
            }
        });

        sleep(Duration::from_millis(2_500)).await;
        token.cancel();
        let outcome = task.await.unwrap();
        sleep(Duration::from_secs(30)).await;

        assert_eq!(outcome, Err(RetryError::Cancelled));
        assert_eq!(client.result_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempt_policy_still_tries_once() {
        let client = FakeSessionClient::new().with_results(processing(3));
        let policy = RetryPolicy {
            max_attempts: 0,
            delay: Duration::from_millis(10),
        };

        let err = fetch_result_with_retry(&client, "C6", &policy, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, RetryError::Exhausted { attempts: 1 });
    }
}
