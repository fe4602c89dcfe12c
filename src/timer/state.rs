use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

/// On-screen elapsed time of a capture. Purely cosmetic: nothing here feeds
/// back into the backend session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub session_id: Option<String>,
    pub elapsed_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    /// Time accumulated from earlier running windows; combines with `running_anchor`
    /// to compute the displayed duration.
    #[serde(skip)]
    pub elapsed_ms_baseline: u64,
    #[serde(skip)]
    pub running_anchor: Option<Instant>,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TimerStatus::Running | TimerStatus::Paused)
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.current_elapsed_ms() / 1000
    }

    pub fn current_elapsed_ms(&self) -> u64 {
        if let (TimerStatus::Running, Some(anchor)) = (self.status, self.running_anchor) {
            self.elapsed_ms_baseline
                .saturating_add(anchor.elapsed().as_millis() as u64)
        } else {
            self.elapsed_ms
        }
    }

    pub fn sync_elapsed_from_anchor(&mut self) {
        if let (TimerStatus::Running, Some(anchor)) = (self.status, self.running_anchor) {
            self.elapsed_ms = self
                .elapsed_ms_baseline
                .saturating_add(anchor.elapsed().as_millis() as u64);
        }
    }

    pub fn begin(&mut self, session_id: String, started_at: DateTime<Utc>, now: Instant) {
        *self = Self {
            status: TimerStatus::Running,
            session_id: Some(session_id),
            elapsed_ms: 0,
            started_at: Some(started_at),
            elapsed_ms_baseline: 0,
            running_anchor: Some(now),
        };
    }

    pub fn pause(&mut self) {
        self.sync_elapsed_from_anchor();
        self.status = TimerStatus::Paused;
        self.running_anchor = None;
        self.elapsed_ms_baseline = self.elapsed_ms;
    }

    pub fn resume(&mut self, now: Instant) {
        self.status = TimerStatus::Running;
        self.elapsed_ms_baseline = self.elapsed_ms;
        self.running_anchor = Some(now);
    }

    pub fn stop(&mut self) {
        self.sync_elapsed_from_anchor();
        self.status = TimerStatus::Stopped;
        self.running_anchor = None;
        self.elapsed_ms_baseline = self.elapsed_ms;
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn paused_window_is_not_counted() {
        let mut state = TimerState::new();
        state.begin("s-1".into(), Utc::now(), Instant::now());

        tokio::time::advance(Duration::from_millis(2_500)).await;
        state.pause();
        assert_eq!(state.elapsed_ms, 2_500);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(state.current_elapsed_ms(), 2_500);

        state.resume(Instant::now());
        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert_eq!(state.elapsed_secs(), 3);

        state.stop();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(state.current_elapsed_ms(), 3_500);
        assert!(!state.is_active());
    }

    #[test]
    fn cancel_resets_everything() {
        let mut state = TimerState::new();
        state.begin("s-2".into(), Utc::now(), Instant::now());
        state.cancel();
        assert_eq!(state.status, TimerStatus::Idle);
        assert!(state.session_id.is_none());
    }
}
