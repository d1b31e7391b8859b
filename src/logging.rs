use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, Once};
use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub const APP_LOG_FILE: &str = "app.log";

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_BACKUPS: usize = 5;

static LOGGER_INITIALIZED: Once = Once::new();

// Keep the guard alive for the lifetime of the program
static FILE_APPENDER_GUARD: LazyLock<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>> =
    LazyLock::new(|| Mutex::new(None));

/// Install console and `app.log` output. Later calls are no-ops.
pub fn init_logging(logs_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(logs_dir)?;

    let log_file_path = logs_dir.join(APP_LOG_FILE);
    if should_rotate_log(&log_file_path)? {
        rotate_log_file(&log_file_path)?;
    }

    LOGGER_INITIALIZED.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let console_layer = fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter.clone());

        let file_appender = tracing_appender::rolling::never(logs_dir, APP_LOG_FILE);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if let Ok(mut guard_mutex) = FILE_APPENDER_GUARD.lock() {
            *guard_mutex = Some(guard);
        }

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_filter(env_filter);

        // A subscriber installed elsewhere (tests, embedding apps) wins
        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init();
    });

    Ok(())
}

fn should_rotate_log(log_file_path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    if !log_file_path.exists() {
        return Ok(false);
    }

    let metadata = fs::metadata(log_file_path)?;
    Ok(metadata.len() > MAX_LOG_SIZE)
}

fn backup_path(log_file_path: &Path, index: usize) -> PathBuf {
    let mut name = log_file_path.as_os_str().to_owned();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

fn rotate_log_file(log_file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    // Shift existing backups (4 -> 5, 3 -> 4, etc.); the oldest is overwritten
    for i in (1..MAX_BACKUPS).rev() {
        let current_backup = backup_path(log_file_path, i);
        if current_backup.exists() {
            fs::rename(&current_backup, backup_path(log_file_path, i + 1))?;
        }
    }

    fs::rename(log_file_path, backup_path(log_file_path, 1))?;
    Ok(())
}
