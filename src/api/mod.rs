pub mod client;
pub mod error;
#[cfg(test)]
pub(crate) mod fake;

pub use client::{HttpSessionClient, JsonTransport, SessionClient};
pub use error::ApiError;
