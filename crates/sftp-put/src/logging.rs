//! Tracing subscriber setup
//!
//! NIST 800-53: AU-2 (Audit Events), AU-12 (Audit Generation)

use crate::config::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Build the log filter: `RUST_LOG` wins, otherwise the configured level with
/// russh kept quiet unless debugging
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let russh_level = if level == "debug" || level == "trace" {
            "info"
        } else {
            "warn"
        };
        EnvFilter::new(format!("{level},russh={russh_level},russh_sftp={russh_level}"))
    })
}

/// Install the global subscriber
///
/// Logs go to stderr, or to `config.file` through a non-blocking writer. The
/// returned guard must be held until exit so buffered lines are flushed.
///
/// # Errors
///
/// Returns [`Error::Config`] if the log file's directory cannot be created or
/// a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(&config.level);

    let Some(log_file) = config.file.as_ref() else {
        let installed = match config.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        installed.map_err(|e| Error::Config(format!("Failed to install logger: {}", e)))?;
        return Ok(None);
    };

    let directory = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    let file_name = log_file
        .file_name()
        .ok_or_else(|| Error::Config(format!("Log file {} has no file name", log_file.display())))?;

    std::fs::create_dir_all(&directory).map_err(|e| {
        Error::Config(format!(
            "Failed to create log directory {}: {}",
            directory.display(),
            e
        ))
    })?;

    let file_appender = tracing_appender::rolling::never(&directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(non_blocking)
            .try_init(),
    };
    installed.map_err(|e| Error::Config(format!("Failed to install logger: {}", e)))?;

    Ok(Some(guard))
}
