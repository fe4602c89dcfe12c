use serde::Serialize;
use tokio::sync::broadcast;

use crate::{models::SessionType, poller::PollStatus};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Everything the view layer reacts to. Serialized with a `type` tag so a
/// front end can consume the stream as JSON.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DashboardEvent {
    #[serde(rename_all = "camelCase")]
    SessionStarted {
        session_id: String,
        child_id: String,
        stimulus_id: String,
        session_type: SessionType,
    },
    #[serde(rename_all = "camelCase")]
    SessionStopped { session_id: String, child_id: String },
    #[serde(rename_all = "camelCase")]
    TimerTick { elapsed_secs: u64, paused: bool },
    /// Informational text that must stay visible, e.g. the pause caveat.
    Notice { message: String },
    /// Toast-style message.
    Notification {
        level: NotificationLevel,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    PollStateChanged { status: PollStatus, attempts: u32 },
    Navigate { route: String },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DashboardEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    /// Having nobody listening is fine; the event is simply dropped.
    pub fn emit(&self, event: DashboardEvent) {
        let _ = self.sender.send(event);
    }

    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.emit(DashboardEvent::Notification {
            level,
            message: message.into(),
        });
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.emit(DashboardEvent::Notice {
            message: message.into(),
        });
    }
}

/// Drain whatever is already queued on `receiver`.
pub fn drain(receiver: &mut broadcast::Receiver<DashboardEvent>) -> Vec<DashboardEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}
