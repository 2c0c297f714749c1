pub mod config;
pub mod retry;

pub use config::{AppConfig, Provider};
pub use retry::{ApiError, RetryPolicy, is_transient, with_retry};
