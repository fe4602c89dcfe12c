pub mod loader;
pub mod retry;
pub mod source;

pub use loader::ReportLoader;
pub use retry::{fetch_result_with_retry, RetryError, RetryPolicy};
pub use source::{DataSource, FallbackReason};
