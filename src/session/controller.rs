use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    api::SessionClient,
    events::{DashboardEvent, EventBus, NotificationLevel},
    models::{SessionType, StartSessionRequest},
    poller::{PollState, ResultPoller, Visibility},
    settings::Settings,
    timer::{SessionTimer, TimerSnapshot, TimerState},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// The capture this view started.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandle {
    pub session_id: String,
    pub child_id: String,
    pub stimulus_id: String,
    pub session_type: SessionType,
}

/// Lifecycle of one gaze session view: start capture, stop it, watch the
/// backend finish processing, then hand over to the report view.
pub struct GazeSessionController<C> {
    client: Arc<C>,
    events: EventBus,
    timer: SessionTimer,
    poller: ResultPoller<C>,
    active: Option<SessionHandle>,
}

impl<C: SessionClient> GazeSessionController<C> {
    pub fn new(client: Arc<C>, events: EventBus, settings: &Settings) -> Self {
        let timer = SessionTimer::new(events.clone(), settings.timer_tick());
        let poller = ResultPoller::new(client.clone(), events.clone(), settings.poll_interval());

        Self {
            client,
            events,
            timer,
            poller,
            active: None,
        }
    }

    pub fn active_session(&self) -> Option<&SessionHandle> {
        self.active.as_ref()
    }

    /// Ask the backend to begin capture. If it refuses or is unreachable the
    /// session does not exist: no timer, no polling.
    pub async fn start_session(
        &mut self,
        child_id: &str,
        stimulus_id: &str,
        session_type: SessionType,
    ) -> Result<SessionHandle> {
        if let Some(active) = &self.active {
            bail!("session {} is already running", active.session_id);
        }
        if self.poller.is_running() {
            bail!("previous session is still processing");
        }

        let request = StartSessionRequest {
            child_id: child_id.to_string(),
            stimulus_id: stimulus_id.to_string(),
            session_type,
        };

        if let Err(err) = self.client.start_session(&request).await {
            log_error!("failed to start session for child {child_id}: {err}");
            self.events.notify(
                NotificationLevel::Error,
                format!("Could not start the session: {err}"),
            );
            return Err(anyhow!(err).context("backend did not start the session"));
        }

        let handle = SessionHandle {
            session_id: Uuid::new_v4().to_string(),
            child_id: request.child_id,
            stimulus_id: request.stimulus_id,
            session_type,
        };

        self.timer.start(handle.session_id.clone()).await?;
        self.active = Some(handle.clone());

        log_info!(
            "session {} started for child {} with stimulus {}",
            handle.session_id,
            handle.child_id,
            handle.stimulus_id
        );
        self.events.emit(DashboardEvent::SessionStarted {
            session_id: handle.session_id.clone(),
            child_id: handle.child_id.clone(),
            stimulus_id: handle.stimulus_id.clone(),
            session_type,
        });
        self.events
            .notify(NotificationLevel::Success, "Gaze tracking started");

        Ok(handle)
    }

    /// End capture and start watching the backend's processing flag. A
    /// failed stop keeps the session active so the user can retry.
    pub async fn stop_session(&mut self) -> Result<SessionHandle> {
        let Some(handle) = self.active.clone() else {
            bail!("no active session to stop");
        };

        if let Err(err) = self.client.stop_session().await {
            log_error!("failed to stop session {}: {err}", handle.session_id);
            self.events.notify(
                NotificationLevel::Error,
                format!("Could not stop the session: {err}"),
            );
            return Err(anyhow!(err).context("backend did not stop the session"));
        }

        self.active = None;
        let final_state = self.timer.stop().await;

        log_info!(
            "session {} stopped after {}s; waiting for processing",
            handle.session_id,
            final_state.elapsed_secs()
        );
        self.events.emit(DashboardEvent::SessionStopped {
            session_id: handle.session_id.clone(),
            child_id: handle.child_id.clone(),
        });
        self.events.notify(
            NotificationLevel::Info,
            "Session stopped. Processing gaze data...",
        );

        self.poller.start(handle.child_id.clone()).await?;
        Ok(handle)
    }

    /// Pauses the on-screen timer only. The backend keeps recording.
    pub async fn pause(&self) -> Result<TimerState> {
        if self.active.is_none() {
            bail!("no active session to pause");
        }
        self.timer.pause().await
    }

    pub async fn resume(&self) -> Result<TimerState> {
        if self.active.is_none() {
            bail!("no active session to resume");
        }
        self.timer.resume().await
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.poller.set_visibility(visibility);
    }

    pub async fn poll_state(&self) -> PollState {
        self.poller.state().await
    }

    pub async fn timer_snapshot(&self) -> TimerSnapshot {
        self.timer.snapshot().await
    }

    /// The view is going away. Local timers and polling stop; a capture that
    /// is still running on the backend is left alone.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(active) = &self.active {
            log_warn!(
                "view closed while session {} is still capturing",
                active.session_id
            );
        }
        self.timer.cancel().await;
        self.poller.stop().await
    }
}

/// Dropping the view without `shutdown` must not leave tasks behind. The
/// poller cancels itself on drop; the ticker is aborted here.
impl<C> Drop for GazeSessionController<C> {
    fn drop(&mut self) {
        self.timer.abort_ticker();
    }
}
