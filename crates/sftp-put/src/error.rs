//! Error types for the upload client
//!
//! NIST 800-53: SI-11 (Error Handling)
//! Implementation: Every failure the client can hit maps to one variant, and
//! every variant maps to a process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Client error types
///
/// NIST 800-53: SI-11 (Error Handling)
/// Implementation: Messages name the host, path or step that failed and never
/// carry credentials
#[derive(Error, Debug)]
pub enum Error {
    /// Local I/O error outside of the transfer itself
    ///
    /// NIST 800-53: SI-11
    /// Implementation: Wraps standard I/O errors (password prompt, metadata)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed command-line input
    ///
    /// NIST 800-53: SI-10 (Information Input Validation), SI-11
    /// Implementation: Target string or local path that cannot be used
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The local file to upload does not exist or is not a regular file
    ///
    /// NIST 800-53: SI-10, SI-11
    /// Implementation: Checked before any network I/O
    #[error("Local file not found: {}", .0.display())]
    LocalFileNotFound(PathBuf),

    /// TCP connection to the remote host failed
    ///
    /// NIST 800-53: SC-7 (Boundary Protection), SI-11
    /// Implementation: Transient, retried by the session
    #[error("Connection error: {0}")]
    Connection(String),

    /// SSH handshake or protocol error
    ///
    /// NIST 800-53: SC-8 (Transmission Confidentiality), SI-11
    /// Implementation: Transient, retried by the session
    #[error("SSH error: {0}")]
    Ssh(String),

    /// Connection attempt exceeded the configured time limit
    ///
    /// NIST 800-53: SC-10 (Network Disconnect), SI-11
    /// Implementation: Transient, retried by the session
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Server host key was rejected
    ///
    /// NIST 800-53: IA-3 (Device Identification and Authentication), SI-11
    /// Implementation: Terminal, the retry loop stops
    #[error("Host key verification failed: {0}")]
    HostKey(String),

    /// Server rejected the supplied credentials
    ///
    /// NIST 800-53: IA-2 (Identification and Authentication), SI-11
    /// Implementation: Terminal, the retry loop stops
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Private key could not be read or decoded
    ///
    /// NIST 800-53: IA-5 (Authenticator Management), SI-11
    /// Implementation: Terminal, the retry loop stops
    #[error("Key file error: {0}")]
    KeyFile(String),

    /// Every connection attempt failed
    ///
    /// NIST 800-53: SI-11
    /// Implementation: Raised once the retry loop is exhausted, carrying the
    /// last attempt's message
    #[error("Connection to {host} failed after {attempts} attempt(s): {last_error}")]
    ConnectionFailed {
        /// Remote host
        host: String,
        /// Number of attempts made
        attempts: u32,
        /// Message of the final attempt's error
        last_error: String,
    },

    /// SFTP subsystem error
    ///
    /// NIST 800-53: SI-11
    /// Implementation: Subsystem start or session errors from russh-sftp
    #[error("SFTP error: {0}")]
    Sftp(String),

    /// The file could not be written to the remote side
    ///
    /// NIST 800-53: SI-11
    /// Implementation: No channel available, or the remote open/write/close failed
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The session handle was already closed
    ///
    /// NIST 800-53: AC-12 (Session Termination), SI-11
    /// Implementation: A closed handle is never reconnected
    #[error("Session has been closed")]
    SessionClosed,

    /// Invalid or unreadable configuration
    ///
    /// NIST 800-53: CM-6 (Configuration Settings), SI-11
    /// Implementation: Config file or merged CLI values failed validation
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if a failed connection attempt is worth repeating
    ///
    /// Credential, key and host key failures will fail the same way on the
    /// next attempt, so they end the retry loop.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Ssh(_) | Error::Timeout(_) | Error::Sftp(_)
        )
    }

    /// Check if error was caused by what the user supplied
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidArguments(_)
                | Error::LocalFileNotFound(_)
                | Error::KeyFile(_)
                | Error::Config(_)
        )
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArguments(_) => 2,
            Error::LocalFileNotFound(_) => 3,
            Error::ConnectionFailed { .. }
            | Error::Connection(_)
            | Error::Ssh(_)
            | Error::Timeout(_)
            | Error::HostKey(_) => 4,
            Error::Authentication(_) | Error::KeyFile(_) => 5,
            Error::UploadFailed(_) | Error::Sftp(_) | Error::SessionClosed => 6,
            Error::Config(_) | Error::Io(_) => 1,
        }
    }
}

impl From<russh::Error> for Error {
    fn from(err: russh::Error) -> Self {
        match err {
            russh::Error::IO(e) => Error::Connection(e.to_string()),
            russh::Error::ConnectionTimeout | russh::Error::KeepaliveTimeout => {
                Error::Timeout(err.to_string())
            }
            russh::Error::UnknownKey | russh::Error::WrongServerSig => {
                Error::HostKey(err.to_string())
            }
            other => Error::Ssh(other.to_string()),
        }
    }
}

impl From<russh::keys::Error> for Error {
    fn from(err: russh::keys::Error) -> Self {
        Error::KeyFile(err.to_string())
    }
}

impl From<russh_sftp::client::error::Error> for Error {
    fn from(err: russh_sftp::client::error::Error) -> Self {
        Error::Sftp(err.to_string())
    }
}

// Additional error constructors
impl Error {
    /// Create invalid arguments error
    pub fn invalid_arguments(context: impl Into<String>) -> Self {
        Error::InvalidArguments(context.into())
    }

    /// Create upload failed error
    pub fn upload_failed(context: impl Into<String>) -> Self {
        Error::UploadFailed(context.into())
    }
}
