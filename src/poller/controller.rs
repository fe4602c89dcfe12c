use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    api::SessionClient,
    events::{DashboardEvent, EventBus},
    settings::MIN_INTERVAL,
};

use super::{loop_worker::poll_loop, PollState};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Whether the hosting view is on screen.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Owns the single poll loop of a session view.
pub struct ResultPoller<C> {
    client: Arc<C>,
    events: EventBus,
    poll_interval: Duration,
    state: Arc<Mutex<PollState>>,
    visibility_tx: watch::Sender<Visibility>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl<C: SessionClient> ResultPoller<C> {
    pub fn new(client: Arc<C>, events: EventBus, poll_interval: Duration) -> Self {
        let (visibility_tx, _) = watch::channel(Visibility::Visible);
        Self {
            client,
            events,
            poll_interval: poll_interval.max(MIN_INTERVAL),
            state: Arc::new(Mutex::new(PollState::new())),
            visibility_tx,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Begin polling for `child_id`. Poll state from any earlier run is
    /// discarded.
    pub async fn start(&mut self, child_id: String) -> Result<()> {
        if self.is_running() {
            bail!("result polling already active");
        }
        self.handle = None;
        self.cancel_token = None;

        let fresh = PollState::for_child(child_id.clone());
        self.events.emit(DashboardEvent::PollStateChanged {
            status: fresh.status,
            attempts: 0,
        });
        *self.state.lock().await = fresh;

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            child_id,
            self.client.clone(),
            self.state.clone(),
            self.events.clone(),
            self.poll_interval,
            self.visibility_tx.subscribe(),
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        let changed = self.visibility_tx.send_if_modified(|current| {
            if *current == visibility {
                false
            } else {
                *current = visibility;
                true
            }
        });
        if changed {
            log_info!("session view is now {visibility:?}");
        }
    }

    pub fn visibility(&self) -> Visibility {
        *self.visibility_tx.borrow()
    }

    pub async fn state(&self) -> PollState {
        self.state.lock().await.clone()
    }

    /// Tear the loop down. No state update or request happens afterwards;
    /// the backend is not told anything.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("result polling task failed to join")
        } else {
            Ok(())
        }
    }
}

impl<C> Drop for ResultPoller<C> {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::fake::{server_error, FakeSessionClient},
        events::{drain, NotificationLevel},
        models::SessionStatus,
        poller::PollStatus,
    };
    use tokio::time::sleep;

    const INTERVAL: Duration = Duration::from_secs(3);

    fn navigations(events: &[DashboardEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                DashboardEvent::Navigate { route } => Some(route.clone()),
                _ => None,
            })
            .collect()
    }

    fn poller(client: &Arc<FakeSessionClient>, bus: &EventBus) -> ResultPoller<FakeSessionClient> {
        ResultPoller::new(client.clone(), bus.clone(), INTERVAL)
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_processing_clears_and_navigates_once() {
        let client = Arc::new(FakeSessionClient::new().with_statuses(vec![
            Ok(SessionStatus::processing()),
            Ok(SessionStatus::processing()),
            Ok(SessionStatus::idle()),
        ]));
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let mut poller = poller(&client, &bus);

        poller.start("C1".into()).await.unwrap();

        sleep(Duration::from_millis(8_900)).await;
        assert_eq!(client.status_calls(), 2);
        assert!(navigations(&drain(&mut rx)).is_empty());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(client.status_calls(), 3);
        assert_eq!(navigations(&drain(&mut rx)), vec!["/reports/C1".to_string()]);

        let state = poller.state().await;
        assert_eq!(state.status, PollStatus::Completed);
        assert_eq!(state.attempts_made, 3);
        assert!(state.navigated_once());
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_page_issues_no_new_requests() {
        let client = Arc::new(
            FakeSessionClient::new()
                .with_statuses(vec![Ok(SessionStatus::processing())])
                .with_status_latency(Duration::from_millis(500)),
        );
        let bus = EventBus::default();
        let mut poller = poller(&client, &bus);

        poller.start("C1".into()).await.unwrap();

        // First request goes out at 3.0s and is still in flight at 3.2s.
        sleep(Duration::from_millis(3_200)).await;
        assert_eq!(client.status_calls(), 1);
        poller.set_visibility(Visibility::Hidden);

        // Suspended right away, before the in-flight answer lands.
        sleep(Duration::from_millis(1)).await;
        let state = poller.state().await;
        assert_eq!(state.status, PollStatus::Suspended);
        assert_eq!(state.attempts_made, 0);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(client.status_calls(), 1);
        let state = poller.state().await;
        assert_eq!(state.status, PollStatus::Suspended);
        assert_eq!(state.attempts_made, 1);

        // Becoming visible resumes the cadence without an immediate check.
        poller.set_visibility(Visibility::Visible);
        sleep(Duration::from_millis(2_900)).await;
        assert_eq!(client.status_calls(), 1);
        assert_eq!(poller.state().await.status, PollStatus::Polling);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(client.status_calls(), 2);

        poller.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn hiding_during_the_wait_cancels_the_pending_check() {
        let client = Arc::new(
            FakeSessionClient::new().with_statuses(vec![Ok(SessionStatus::processing())]),
        );
        let bus = EventBus::default();
        let mut poller = poller(&client, &bus);

        poller.start("C1".into()).await.unwrap();
        sleep(Duration::from_secs(2)).await;
        poller.set_visibility(Visibility::Hidden);
        sleep(Duration::from_secs(20)).await;

        assert_eq!(client.status_calls(), 0);
        assert_eq!(poller.state().await.status, PollStatus::Suspended);
        poller.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_request_leaves_state_untouched() {
        let client = Arc::new(
            FakeSessionClient::new()
                .with_statuses(vec![Ok(SessionStatus::idle())])
                .with_status_latency(Duration::from_secs(1)),
        );
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let mut poller = poller(&client, &bus);

        poller.start("C1".into()).await.unwrap();
        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(client.status_calls(), 1);
        drain(&mut rx);

        poller.stop().await.unwrap();
        sleep(Duration::from_secs(30)).await;

        assert_eq!(client.status_calls(), 1);
        assert!(drain(&mut rx).is_empty());
        let state = poller.state().await;
        assert_eq!(state.attempts_made, 0);
        assert_eq!(state.status, PollStatus::Polling);
        assert!(!state.navigated_once());
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_reported_and_polling_continues() {
        let client = Arc::new(FakeSessionClient::new().with_statuses(vec![
            Err(server_error()),
            Ok(SessionStatus::idle()),
        ]));
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let mut poller = poller(&client, &bus);

        poller.start("C2".into()).await.unwrap();
        sleep(Duration::from_secs(10)).await;

        let events = drain(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            DashboardEvent::Notification {
                level: NotificationLevel::Error,
                ..
            }
        )));
        assert_eq!(navigations(&events), vec!["/reports/C2".to_string()]);
        assert_eq!(client.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_raised_to_the_floor() {
        let client = Arc::new(
            FakeSessionClient::new().with_statuses(vec![Ok(SessionStatus::processing())]),
        );
        let bus = EventBus::default();
        let mut poller = ResultPoller::new(client.clone(), bus, Duration::ZERO);

        poller.start("C1".into()).await.unwrap();
        sleep(MIN_INTERVAL * 5 + MIN_INTERVAL / 2).await;

        assert_eq!(client.status_calls(), 5);
        poller.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_loop_at_a_time() {
        let client = Arc::new(
            FakeSessionClient::new().with_statuses(vec![Ok(SessionStatus::processing())]),
        );
        let bus = EventBus::default();
        let mut poller = poller(&client, &bus);

        poller.start("C1".into()).await.unwrap();
        assert!(poller.start("C1".into()).await.is_err());

        poller.stop().await.unwrap();
        poller.start("C4".into()).await.unwrap();
        assert_eq!(poller.state().await.child_id.as_deref(), Some("C4"));
        poller.stop().await.unwrap();
    }
}
