use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    api::SessionClient,
    db::Database,
    events::{EventBus, NotificationLevel},
    models::GazeResult,
};

use super::{fetch_result_with_retry, DataSource, RetryError, RetryPolicy};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Backs the report and results views: live data first, the local result
/// cache when the backend cannot deliver.
pub struct ReportLoader<C> {
    client: Arc<C>,
    cache: Option<Database>,
    events: EventBus,
    policy: RetryPolicy,
    cancel_token: CancellationToken,
}

impl<C: SessionClient> ReportLoader<C> {
    pub fn new(
        client: Arc<C>,
        cache: Option<Database>,
        events: EventBus,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            cache,
            events,
            policy,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Share `token` so the owning view can abandon loads without holding
    /// on to the loader.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Abandon in-flight loads; nothing is emitted or cached afterwards.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Result for one child. `None` only when the loader was cancelled.
    pub async fn load(&self, child_id: &str) -> Option<DataSource<GazeResult>> {
        let outcome =
            fetch_result_with_retry(&*self.client, child_id, &self.policy, &self.cancel_token)
                .await;
        if self.cancel_token.is_cancelled() {
            return None;
        }

        let cached = match &outcome {
            Ok(result) => {
                self.remember(std::slice::from_ref(result)).await;
                None
            }
            Err(RetryError::Cancelled) => None,
            Err(_) => self.cached_for_child(child_id).await,
        };
        if self.cancel_token.is_cancelled() {
            return None;
        }

        if let Err(RetryError::Transport(err)) = &outcome {
            self.events.notify(
                NotificationLevel::Error,
                format!("Failed to load report: {err}"),
            );
        }
        let source = DataSource::resolve(outcome, || cached)?;
        self.announce(&source);
        Some(source)
    }

    /// All results for the listing view. The listing has no processing
    /// state, so there is no retry.
    pub async fn load_all(&self) -> Option<DataSource<Vec<GazeResult>>> {
        let outcome = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(RetryError::Cancelled),
            listed = self.client.list_results() => listed.map_err(RetryError::from),
        };
        if self.cancel_token.is_cancelled() {
            return None;
        }

        let cached = match &outcome {
            Ok(results) => {
                self.remember(results).await;
                None
            }
            Err(RetryError::Cancelled) => None,
            Err(_) => self.cached_all().await,
        };
        if self.cancel_token.is_cancelled() {
            return None;
        }

        if let Err(RetryError::Transport(err)) = &outcome {
            self.events.notify(
                NotificationLevel::Error,
                format!("Failed to load results: {err}"),
            );
        }
        let source = DataSource::resolve(outcome, || cached)?;
        self.announce(&source);
        Some(source)
    }

    fn announce<T>(&self, source: &DataSource<T>) {
        if let Some(notice) = source.notice() {
            log_info!("{notice}");
            self.events.notify(NotificationLevel::Warning, notice);
        }
    }

    async fn remember(&self, results: &[GazeResult]) {
        let Some(cache) = &self.cache else {
            return;
        };
        for result in results {
            if self.cancel_token.is_cancelled() {
                return;
            }
            if let Err(err) = cache.upsert_result(result).await {
                log_warn!("failed to cache result {}: {err:#}", result.id);
            }
        }
    }

    async fn cached_for_child(&self, child_id: &str) -> Option<GazeResult> {
        let cache = self.cache.as_ref()?;
        match cache.latest_result_for_child(child_id).await {
            Ok(result) => result,
            Err(err) => {
                log_warn!("failed to read cached result for child {child_id}: {err:#}");
                None
            }
        }
    }

    async fn cached_all(&self) -> Option<Vec<GazeResult>> {
        let cache = self.cache.as_ref()?;
        match cache.list_cached_results().await {
            Ok(results) if results.is_empty() => None,
            Ok(results) => Some(results),
            Err(err) => {
                log_warn!("failed to read cached results: {err:#}");
                None
            }
        }
    }
}
