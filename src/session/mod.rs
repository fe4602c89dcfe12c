pub mod controller;

pub use controller::{GazeSessionController, SessionHandle};
