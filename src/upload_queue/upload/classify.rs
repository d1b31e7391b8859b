//! Response classification.
//!
//! Pure mapping from (status, headers, body) to the retry loop's next step.
//! No I/O happens here.

use crate::error::UploadError;
use crate::upload_queue::report::Report;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug)]
pub enum Classification {
    /// 200 with a valid report body
    Success(Report),
    /// 429; wait `retry_after` (plus grace) and try again
    RateLimited { retry_after: Duration },
    /// 500 while detailed WvW was requested; retry without it
    RetryableServerError,
    /// Anything else; give up
    Terminal(UploadError),
}

pub fn classify(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
    detailed_wvw: bool,
) -> Classification {
    match status {
        StatusCode::OK => match serde_json::from_slice::<Report>(body) {
            Ok(report) => Classification::Success(report),
            Err(source) => Classification::Terminal(UploadError::Parse {
                source,
                body: String::from_utf8_lossy(body).into_owned(),
            }),
        },
        StatusCode::TOO_MANY_REQUESTS => Classification::RateLimited {
            retry_after: parse_retry_after(headers),
        },
        StatusCode::INTERNAL_SERVER_ERROR if detailed_wvw => Classification::RetryableServerError,
        _ => Classification::Terminal(UploadError::Server {
            status,
            headers: headers.clone(),
        }),
    }
}

/// `Retry-After` as whole seconds; absent or unparseable means zero
pub fn parse_retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::ZERO)
}
