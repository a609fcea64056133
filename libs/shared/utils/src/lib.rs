pub mod jwt;
pub mod retry;
pub mod test_utils;

pub use retry::{RetryPolicy, Retryable};
