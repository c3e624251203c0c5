//! External HTTP plumbing: the shared retry utility.

pub mod retry;

pub use retry::{retry_request, FetchError, RetryPolicy};
