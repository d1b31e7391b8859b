use crate::error::UploadError;
use crate::upload_queue::upload::RetryPolicy;
use crate::upload_queue::{RateLimit, UploadOptions, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKER_COUNT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://dps.report/uploadContent";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    pub endpoint: String,
    #[serde(rename = "workerCount")]
    pub worker_count: usize,
    #[serde(rename = "queueCapacity")]
    pub queue_capacity: usize,
    #[serde(rename = "rateLimit")]
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    /// Options used when a submission does not carry its own
    pub defaults: UploadOptions,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            worker_count: DEFAULT_WORKER_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            defaults: UploadOptions::new(true, false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    #[serde(rename = "refillIntervalSecs")]
    pub refill_interval_secs: f64,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            refill_interval_secs: 10.0,
            burst: 45,
        }
    }
}

impl RateLimitConfig {
    pub fn to_rate_limit(&self) -> Result<RateLimit, UploadError> {
        let refill_interval = Duration::try_from_secs_f64(self.refill_interval_secs)
            .map_err(|e| {
                UploadError::Config(format!(
                    "rateLimit.refillIntervalSecs {} is out of range: {}",
                    self.refill_interval_secs, e
                ))
            })?;

        Ok(RateLimit {
            refill_interval,
            burst: self.burst,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(rename = "maxAttempts")]
    pub max_attempts: u32,
    #[serde(rename = "cooldownGraceSecs")]
    pub cooldown_grace_secs: u64,
    #[serde(rename = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            cooldown_grace_secs: 2,
            request_timeout_secs: 300,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.cooldown_grace_secs),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl UploaderConfig {
    /// Parsed upload endpoint
    pub fn endpoint_url(&self) -> Result<Url, UploadError> {
        Url::parse(&self.endpoint)
            .map_err(|e| UploadError::Config(format!("invalid endpoint {:?}: {}", self.endpoint, e)))
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        self.endpoint_url()?;

        if self.worker_count == 0 {
            return Err(UploadError::Config("workerCount must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(UploadError::Config("queueCapacity must be at least 1".into()));
        }
        if self.rate_limit.burst == 0 {
            return Err(UploadError::Config("rateLimit.burst must be at least 1".into()));
        }
        if self.rate_limit.to_rate_limit()?.refill_interval.is_zero() {
            return Err(UploadError::Config(
                "rateLimit.refillIntervalSecs must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(UploadError::Config("retry.maxAttempts must be at least 1".into()));
        }
        if self.retry.request_timeout_secs == 0 {
            return Err(UploadError::Config(
                "retry.requestTimeoutSecs must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

pub fn get_config_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(home_dir) = dirs::home_dir() {
        Ok(home_dir.join(".arcdps-log-uploader"))
    } else {
        Err("Could not find home directory".into())
    }
}

pub fn get_config_file_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn get_logs_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    Ok(get_config_dir()?.join("logs"))
}

/// Create `dir` if missing, readable by the owner only on Unix
fn ensure_private_dir(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;

        // Set permissions to 700 (read/write/execute for owner only) on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(dir)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(dir, permissions)?;
        }
    }
    Ok(())
}

pub fn ensure_config_dir() -> Result<(), Box<dyn std::error::Error>> {
    ensure_private_dir(&get_config_dir()?)
}

pub fn ensure_logs_dir() -> Result<(), Box<dyn std::error::Error>> {
    ensure_private_dir(&get_logs_dir()?)
}

pub fn load_config() -> Result<UploaderConfig, Box<dyn std::error::Error>> {
    ensure_config_dir()?;
    load_config_from(&get_config_file_path()?)
}

/// Load from an explicit path; a missing file yields the defaults
pub fn load_config_from(path: &Path) -> Result<UploaderConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        let content = fs::read_to_string(path)?;
        let config: UploaderConfig = serde_json::from_str(&content)?;
        Ok(config)
    } else {
        Ok(UploaderConfig::default())
    }
}

pub fn save_config(config: &UploaderConfig) -> Result<(), Box<dyn std::error::Error>> {
    ensure_config_dir()?;
    save_config_to(config, &get_config_file_path()?)
}

pub fn save_config_to(
    config: &UploaderConfig,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;

    // Set permissions to 600 (read/write for owner only) on Unix systems
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions)?;
    }

    Ok(())
}
