pub mod controller;
pub mod state;

pub use controller::{SessionTimer, TimerSnapshot, PAUSE_NOTICE};
pub use state::{TimerState, TimerStatus};
