use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::error;

use arcdps_log_uploader::cli::{self, Cli};
use arcdps_log_uploader::{config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging system
    config::ensure_logs_dir().map_err(|e| anyhow!("Failed to create logs directory: {}", e))?;
    let logs_dir = config::get_logs_dir().map_err(|e| anyhow!("{}", e))?;
    if let Err(e) = logging::init_logging(&logs_dir) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = cli.load_config()?;

    match cli::run(&cli, &config).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Upload run failed: {:#}", e);
            Err(e)
        }
    }
}
