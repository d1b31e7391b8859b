//! Single-upload machinery.
//!
//! Request construction, response classification and the retry loop that
//! ties them to the shared rate gate.

pub mod classify;
pub mod request;
pub mod retry;

pub use classify::{classify, parse_retry_after, Classification};
pub use request::{build_upload_url, UploadRequest, FILE_FIELD};
pub use retry::{RetryController, RetryPolicy, UploadProgress};
