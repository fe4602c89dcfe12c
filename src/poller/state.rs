use serde::Serialize;

use crate::models::SessionStatus;

use super::NavigationLatch;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PollStatus {
    #[default]
    Idle,
    Polling,
    Suspended,
    Completed,
}

/// What the loop should do after recording a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTransition {
    Continue,
    Completed { navigate: bool },
}

/// Client-local bookkeeping for one poll run. Reset whenever a new session
/// is stopped; never shared between sessions.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    pub status: PollStatus,
    pub child_id: Option<String>,
    pub attempts_made: u32,
    pub last_status: Option<SessionStatus>,
    pub navigation: NavigationLatch,
}

impl PollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_child(child_id: String) -> Self {
        Self {
            status: PollStatus::Polling,
            child_id: Some(child_id),
            ..Self::default()
        }
    }

    pub fn is_polling(&self) -> bool {
        self.status == PollStatus::Polling
    }

    pub fn navigated_once(&self) -> bool {
        self.navigation.has_fired()
    }

    /// Record one `/status` answer. The first `processing == false` moves to
    /// `Completed` and arms the navigation; anything after that is inert.
    pub fn record_status(&mut self, status: SessionStatus) -> PollTransition {
        self.attempts_made = self.attempts_made.saturating_add(1);
        let processing = status.processing;
        self.last_status = Some(status);

        if processing && self.status != PollStatus::Completed {
            return PollTransition::Continue;
        }

        self.status = PollStatus::Completed;
        PollTransition::Completed {
            navigate: self.navigation.fire(),
        }
    }

    /// A failed status request still counts as an attempt.
    pub fn record_failure(&mut self) {
        self.attempts_made = self.attempts_made.saturating_add(1);
    }

    /// Visibility gate. Completed is terminal and ignores it.
    pub fn set_suspended(&mut self, suspended: bool) -> bool {
        let next = match (self.status, suspended) {
            (PollStatus::Polling, true) => PollStatus::Suspended,
            (PollStatus::Suspended, false) => PollStatus::Polling,
            _ => return false,
        };
        self.status = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_navigates_exactly_once() {
        let mut state = PollState::for_child("C1".into());
        let answers = [true, true, false, false, true, false];

        let navigations = answers
            .iter()
            .map(|processing| {
                state.record_status(SessionStatus {
                    processing: *processing,
                    session: None,
                })
            })
            .filter(|transition| *transition == PollTransition::Completed { navigate: true })
            .count();

        assert_eq!(navigations, 1);
        assert_eq!(state.status, PollStatus::Completed);
        assert!(state.navigated_once());
        assert_eq!(state.attempts_made, 6);
    }

    #[test]
    fn processing_keeps_polling() {
        let mut state = PollState::for_child("C1".into());
        assert_eq!(
            state.record_status(SessionStatus::processing()),
            PollTransition::Continue
        );
        assert!(state.is_polling());
        assert!(!state.navigated_once());
    }

    #[test]
    fn suspension_only_toggles_between_polling_and_suspended() {
        let mut state = PollState::for_child("C1".into());
        assert!(state.set_suspended(true));
        assert_eq!(state.status, PollStatus::Suspended);
        assert!(!state.set_suspended(true));
        assert!(state.set_suspended(false));
        assert_eq!(state.status, PollStatus::Polling);

        state.record_status(SessionStatus::idle());
        assert!(!state.set_suspended(true));
        assert_eq!(state.status, PollStatus::Completed);

        let mut idle = PollState::new();
        assert!(!idle.set_suspended(true));
    }
}
