//! Retry loop around a single log upload.
//!
//! Drives request building, rate gating and classification until the upload
//! reaches a terminal outcome. Rate limiting (429) and the detailed-WvW
//! downgrade (500) are resolved here and never escape as errors, unless the
//! attempt cap is reached.

use crate::error::UploadError;
use crate::upload_queue::rate_gate::RateGate;
use crate::upload_queue::report::Report;
use crate::upload_queue::types::{LogStatus, UploadOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{error, info, warn};
use url::Url;

use super::classify::{classify, Classification};
use super::request::UploadRequest;

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum network attempts per processing cycle
    pub max_attempts: u32,
    /// Added on top of the server's `Retry-After`
    pub cooldown_grace: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            cooldown_grace: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, cooldown_grace: Duration) -> Self {
        Self {
            max_attempts,
            cooldown_grace,
        }
    }
}

/// Progress notifications emitted while an upload runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadProgress {
    Status(LogStatus),
    /// The service rejected detailed WvW; continuing without it
    DetailedForcedOff,
}

#[derive(Debug, Clone)]
pub struct RetryController {
    client: reqwest::Client,
    endpoint: Url,
    gate: Arc<RateGate>,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(
        client: reqwest::Client,
        endpoint: Url,
        gate: Arc<RateGate>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            endpoint,
            gate,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Upload `path` until success or a terminal error.
    ///
    /// `options` is updated in place when detailed WvW gets downgraded, so
    /// the caller sees the options the final request actually used.
    pub async fn run<F>(
        &self,
        path: &Path,
        options: &mut UploadOptions,
        mut on_progress: F,
    ) -> Result<Report, UploadError>
    where
        F: FnMut(UploadProgress),
    {
        let file = path.display().to_string();
        let mut attempts: u32 = 0;

        loop {
            if attempts >= self.policy.max_attempts {
                error!(file = %file, attempts, "Giving up on upload, retry limit reached");
                return Err(UploadError::RetriesExhausted { attempts });
            }

            let request = UploadRequest::prepare(&self.endpoint, path, options).await?;

            on_progress(UploadProgress::Status(LogStatus::WaitingRateLimited));
            self.gate.acquire().await;
            on_progress(UploadProgress::Status(LogStatus::Uploading));

            attempts += 1;
            info!(
                file = %file,
                attempt = attempts,
                bytes = request.len(),
                detailed_wvw = options.detailed_wvw,
                anonymous = options.anonymous,
                "Uploading log"
            );

            let response = request.into_request(&self.client)?.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;

            match classify(status, &headers, &body, options.detailed_wvw) {
                Classification::Success(report) => {
                    info!(file = %file, permalink = %report.permalink, "Upload complete");
                    return Ok(report);
                }
                Classification::RateLimited { retry_after } => {
                    let cooldown = retry_after + self.policy.cooldown_grace;
                    warn!(
                        file = %file,
                        retry_after_secs = retry_after.as_secs(),
                        "Request rate limited, cooling down for {:?}",
                        cooldown
                    );
                    let until = Instant::now() + cooldown;
                    self.gate.extend_cooldown(until);

                    // Other workers still honor the cool-down; this one stops here
                    if attempts >= self.policy.max_attempts {
                        error!(file = %file, attempts, "Giving up on upload, retry limit reached");
                        return Err(UploadError::RetriesExhausted { attempts });
                    }

                    on_progress(UploadProgress::Status(LogStatus::WaitingRateLimitedHard));
                    sleep_until(until).await;
                }
                Classification::RetryableServerError => {
                    warn!(
                        file = %file,
                        "Upload failed due to server error, trying again without detailed WvW"
                    );
                    options.detailed_wvw = false;
                    on_progress(UploadProgress::DetailedForcedOff);
                }
                Classification::Terminal(err) => {
                    match &err {
                        UploadError::Server { status, headers } => error!(
                            file = %file,
                            status = status.as_u16(),
                            headers = ?headers,
                            "Report service rejected upload"
                        ),
                        UploadError::Parse { body, .. } => error!(
                            file = %file,
                            body = %body,
                            "Could not parse report response"
                        ),
                        other => error!(file = %file, error = %other, "Upload failed"),
                    }
                    return Err(err);
                }
            }
        }
    }
}
