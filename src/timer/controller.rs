use std::{
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::{bail, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    events::{DashboardEvent, EventBus},
    settings::MIN_INTERVAL,
};

use super::{TimerState, TimerStatus};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Shown every time the timer is paused. Pausing freezes the counter on
/// screen only; the backend keeps recording gaze until the session is
/// stopped.
pub const PAUSE_NOTICE: &str =
    "Timer paused. Gaze tracking is still recording; stop the session to end the capture.";

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub elapsed_secs: u64,
}

#[derive(Clone)]
pub struct SessionTimer {
    state: Arc<Mutex<TimerState>>,
    events: EventBus,
    ticker: Arc<StdMutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl SessionTimer {
    pub fn new(events: EventBus, tick_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
            events,
            ticker: Arc::new(StdMutex::new(None)),
            tick_interval: tick_interval.max(MIN_INTERVAL),
        }
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        let mut guard = self.state.lock().await;
        guard.sync_elapsed_from_anchor();
        TimerSnapshot {
            elapsed_secs: guard.elapsed_secs(),
            state: guard.clone(),
        }
    }

    pub async fn start(&self, session_id: String) -> Result<TimerState> {
        let state = {
            let mut state = self.state.lock().await;
            if state.is_active() {
                bail!("timer already active");
            }
            state.begin(session_id, Utc::now(), Instant::now());
            state.clone()
        };

        self.spawn_ticker();
        Ok(state)
    }

    /// Freeze the visible counter. Backend capture is unaffected, which is
    /// why the notice goes out on every pause.
    pub async fn pause(&self) -> Result<TimerState> {
        let state = {
            let mut state = self.state.lock().await;
            if state.status != TimerStatus::Running {
                bail!("timer is not running");
            }
            state.pause();
            state.clone()
        };

        log_info!("timer paused at {}s; backend capture continues", state.elapsed_secs());
        self.events.notice(PAUSE_NOTICE);
        self.emit_tick(&state);
        Ok(state)
    }

    pub async fn resume(&self) -> Result<TimerState> {
        let state = {
            let mut state = self.state.lock().await;
            if state.status != TimerStatus::Paused {
                bail!("timer is not paused");
            }
            state.resume(Instant::now());
            state.clone()
        };

        self.emit_tick(&state);
        Ok(state)
    }

    /// Stop counting and keep the final value on display.
    pub async fn stop(&self) -> TimerState {
        let state = {
            let mut state = self.state.lock().await;
            if state.is_active() {
                state.stop();
            }
            state.clone()
        };
        self.abort_ticker();
        state
    }

    pub async fn cancel(&self) {
        self.state.lock().await.cancel();
        self.abort_ticker();
    }

    /// Kill the ticker task without touching the timer state. Safe to call
    /// from `Drop`.
    pub fn abort_ticker(&self) {
        if let Some(handle) = self.ticker_slot().take() {
            handle.abort();
        }
    }

    fn ticker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker_slot();
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let events = self.events.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;

                let snapshot = {
                    let mut guard = state.lock().await;
                    match guard.status {
                        TimerStatus::Running => {}
                        TimerStatus::Paused => continue,
                        TimerStatus::Idle | TimerStatus::Stopped => break,
                    }
                    guard.sync_elapsed_from_anchor();
                    guard.clone()
                };

                events.emit(DashboardEvent::TimerTick {
                    elapsed_secs: snapshot.elapsed_secs(),
                    paused: false,
                });
            }
        });

        *ticker_guard = Some(handle);
    }

    fn emit_tick(&self, state: &TimerState) {
        self.events.emit(DashboardEvent::TimerTick {
            elapsed_secs: state.elapsed_secs(),
            paused: state.status == TimerStatus::Paused,
        });
    }
}
