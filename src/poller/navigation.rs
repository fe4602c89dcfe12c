use serde::Serialize;

/// Route of the report view for a child.
pub fn report_route(child_id: &str) -> String {
    format!("/reports/{child_id}")
}

/// One-shot guard for the redirect to the report view. Late or duplicate
/// completed-status responses cannot fire it again.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct NavigationLatch {
    fired: bool,
}

impl NavigationLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` only on the first call.
    pub fn fire(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
