pub mod controller;
mod loop_worker;
pub mod navigation;
pub mod state;

pub use controller::{ResultPoller, Visibility};
pub use navigation::{report_route, NavigationLatch};
pub use state::{PollState, PollStatus, PollTransition};
