//! Configuration for the upload client

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upload client configuration
///
/// Every field has a documented default, so an empty TOML file (or no file at
/// all) yields the behavior of the plain `sftp-put <file> <target>` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// SSH port on the remote host
    #[serde(default = "default_port")]
    pub port: u16,

    /// Private key used when no password is supplied
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,

    /// Number of connection attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Time limit for a single connection attempt in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How the server host key is verified
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,

    /// known_hosts file (defaults to ~/.ssh/known_hosts)
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server host key verification mode
///
/// NIST 800-53: IA-3 (Device Identification and Authentication)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Only hosts already present in known_hosts are accepted
    Strict,
    /// Unknown hosts are recorded in known_hosts, changed keys are rejected
    #[default]
    AcceptNew,
    /// Any host key is accepted
    Off,
}

/// Logging configuration
///
/// NIST 800-53: AU-2 (Audit Events), AU-12 (Audit Generation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (text or json)
    pub format: LogFormat,
    /// Optional log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text logging for human readability
    Text,
    /// JSON structured logging for log aggregators
    Json,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            key_path: default_key_path(),
            max_attempts: default_max_attempts(),
            connect_timeout_secs: default_connect_timeout(),
            host_key_policy: HostKeyPolicy::default(),
            known_hosts_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> crate::Result<()> {
        if self.port == 0 {
            return Err(crate::Error::Config("port must not be 0".to_string()));
        }

        if self.max_attempts == 0 {
            return Err(crate::Error::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(crate::Error::Config(
                "connect_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Key path with a leading `~` replaced by the home directory
    pub fn resolved_key_path(&self) -> PathBuf {
        expand_tilde(&self.key_path)
    }

    /// known_hosts path, falling back to `~/.ssh/known_hosts`
    pub fn resolved_known_hosts_path(&self) -> PathBuf {
        let path = self
            .known_hosts_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("~/.ssh/known_hosts"));
        expand_tilde(&path)
    }
}

/// Replace a leading `~` with the invoking user's home directory
///
/// Paths without a leading `~`, and every path when `HOME` is unset, are
/// returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

fn default_port() -> u16 {
    22
}

fn default_key_path() -> PathBuf {
    PathBuf::from("~/.ssh/id_rsa")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_connect_timeout() -> u64 {
    30
}
