//! Command-line interface definitions and the batch upload driver

use crate::config::{self, UploaderConfig};
use crate::registry::{is_log_file, LogRegistry};
use crate::upload_queue::{LogStatus, UploadCallbacks, UploadOptions, Uploader};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload arcdps logs to dps.report", long_about = None)]
pub struct Cli {
    /// Log files to upload (.evtc, .evtc.zip, .zevtc)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Hide player names in the report
    #[arg(long)]
    pub anonymous: bool,

    /// Do not request detailed WvW reports
    #[arg(long)]
    pub no_detailed: bool,

    /// Override the upload endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Resolve the configuration this invocation runs with
    pub fn load_config(&self) -> Result<UploaderConfig> {
        let mut config = match &self.config {
            Some(path) => config::load_config_from(path),
            None => config::load_config(),
        }
        .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;

        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        Ok(config)
    }

    /// Per-run options; flags only ever switch features off
    pub fn options(&self, defaults: UploadOptions) -> UploadOptions {
        UploadOptions::new(
            defaults.detailed_wvw && !self.no_detailed,
            defaults.anonymous || self.anonymous,
        )
    }
}

/// Upload every log file named on the command line and print one line per
/// file. Returns whether all uploads succeeded.
pub async fn run(cli: &Cli, config: &UploaderConfig) -> Result<bool> {
    let uploader = Uploader::start(config).context("Failed to start uploader")?;
    let options = cli.options(uploader.defaults());

    let mut registry = LogRegistry::new();
    for path in &cli.files {
        if !is_log_file(path) {
            warn!(file = %path.display(), "Skipping file that is not an arcdps log");
            continue;
        }

        let (entry, _) = registry.add(path.clone());
        if !LogRegistry::should_submit(&entry) {
            continue;
        }

        let callbacks = UploadCallbacks::new().on_change(|entry| {
            info!(file = %entry.file_name(), status = %entry.status(), "Status changed");
        });
        if let Err(e) = uploader.submit_with(entry, options, callbacks).await {
            warn!(file = %path.display(), "Could not queue upload: {}", e);
        }
    }

    uploader.shutdown().await;

    let mut all_ok = true;
    for entry in registry.entries() {
        let snapshot = entry.snapshot();
        match (snapshot.status, snapshot.report, snapshot.error) {
            (LogStatus::Done, Some(report), _) => {
                println!("{} -> {}", entry.path().display(), report.permalink);
            }
            (_, _, Some(error)) => {
                all_ok = false;
                println!("{} -> error: {}", entry.path().display(), error);
            }
            (status, _, _) => {
                all_ok = false;
                println!("{} -> {}", entry.path().display(), status);
            }
        }
    }

    let (finished, total) = registry.progress();
    info!(finished, total, "Upload batch finished");

    Ok(all_ok && !registry.is_empty())
}
