// Library exports for the CLI binary and integration tests

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod registry;
pub mod upload_queue;

pub use config::UploaderConfig;
pub use error::{ErrorKind, UploadError};
pub use registry::{is_log_file, LogRegistry};
pub use upload_queue::{
    LogEntry, LogStatus, Report, UploadCallbacks, UploadOptions, UploadResult, Uploader,
};
