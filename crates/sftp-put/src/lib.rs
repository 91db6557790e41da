//! # sftp-put
//!
//! Upload a single local file to a remote directory over SFTP.
//!
//! The transfer itself is delegated to russh and russh-sftp. This crate adds
//! the session handling around it:
//!
//! - `user@host:remote-dir` target parsing
//! - password or private key authentication, never both
//! - a bounded connection retry loop
//! - host key checking against known_hosts
//! - explicit, idempotent session close

pub mod auth;
pub mod config;
pub mod error;
pub mod host_keys;
pub mod logging;
pub mod session;
pub mod target;
pub mod transport;
pub mod upload;

pub use auth::Credential;
pub use config::{ClientConfig, HostKeyPolicy, LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use session::{SessionHandle, SessionState};
pub use target::RemoteTarget;
pub use transport::{Connector, RusshConnector, SftpChannel, Transport};
pub use upload::{upload_file, UploadReport};
