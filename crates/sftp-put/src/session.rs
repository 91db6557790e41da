//! Session handle: lazy connection, upload and close
//!
//! NIST 800-53: AC-12 (Session Termination), IA-2 (Identification and Authentication)
//! Implementation: One handle targets one (host, username) pair. The transport
//! and SFTP channel are created together on first use and released together on
//! close.

use crate::auth::Credential;
use crate::config::ClientConfig;
use crate::target::RemoteTarget;
use crate::transport::{Connector, SftpChannel, Transport};
use crate::{Error, Result};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Observable connection state of a [`SessionHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection attempt has been made yet
    Unconnected,
    /// Transport and SFTP channel are established
    Connected,
    /// Connection attempts ran out or hit a terminal error
    Failed,
    /// The handle was closed and cannot be used again
    Closed,
}

enum Connection {
    Unconnected,
    Connected {
        transport: Box<dyn Transport>,
        channel: Box<dyn SftpChannel>,
    },
    Failed,
    Closed,
}

/// Handle bundling connection parameters with a lazily created transport and
/// SFTP channel
pub struct SessionHandle {
    host: String,
    port: u16,
    username: String,
    password: Option<SecretString>,
    key_path: PathBuf,
    max_attempts: u32,
    connect_timeout: Duration,
    connector: Arc<dyn Connector>,
    connection: Connection,
}

impl SessionHandle {
    /// Create a handle. No network I/O happens until [`connect`](Self::connect)
    /// or [`upload`](Self::upload).
    ///
    /// Attempt count and per-attempt timeout start at the [`ClientConfig`]
    /// defaults.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: Option<SecretString>,
        key_path: impl Into<PathBuf>,
        port: u16,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let defaults = ClientConfig::default();
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password,
            key_path: key_path.into(),
            max_attempts: defaults.max_attempts,
            connect_timeout: Duration::from_secs(defaults.connect_timeout_secs),
            connector,
            connection: Connection::Unconnected,
        }
    }

    /// Create a handle for `target` with port, key path and retry settings
    /// taken from `config`
    pub fn from_config(
        target: &RemoteTarget,
        password: Option<SecretString>,
        config: &ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self::new(
            target.host.clone(),
            target.username.clone(),
            password,
            config.resolved_key_path(),
            config.port,
            connector,
        )
        .with_max_attempts(config.max_attempts)
        .with_connect_timeout(Duration::from_secs(config.connect_timeout_secs))
    }

    /// Set the number of connection attempts (at least one is always made)
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the time limit for a single connection attempt
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Current connection state
    pub fn state(&self) -> SessionState {
        match self.connection {
            Connection::Unconnected => SessionState::Unconnected,
            Connection::Connected { .. } => SessionState::Connected,
            Connection::Failed => SessionState::Failed,
            Connection::Closed => SessionState::Closed,
        }
    }

    /// Establish the transport and SFTP channel if not already done
    ///
    /// Makes up to `max_attempts` attempts with no delay between them and stops
    /// at the first success. Transient failures are retried; rejected
    /// credentials, unusable keys and rejected host keys end the loop at once.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArguments`] if host or username is empty (no attempt is made)
    /// - [`Error::ConnectionFailed`] once every attempt failed transiently
    /// - the terminal error itself (e.g. [`Error::Authentication`]) otherwise
    /// - [`Error::Connection`] if an earlier call already failed
    /// - [`Error::SessionClosed`] after [`close`](Self::close)
    pub async fn connect(&mut self) -> Result<()> {
        match self.connection {
            Connection::Unconnected => {}
            Connection::Connected { .. } => return Ok(()),
            Connection::Failed => {
                return Err(Error::Connection(format!(
                    "connecting to {} already failed, a new session is required",
                    self.host
                )))
            }
            Connection::Closed => return Err(Error::SessionClosed),
        }

        if self.host.is_empty() || self.username.is_empty() {
            error!("Cannot connect to remote server, either host or username is missing");
            return Err(Error::invalid_arguments(
                "host and username are required to connect",
            ));
        }

        info!(host = %self.host, port = self.port, "Creating SFTP client");

        let credential = Credential::select(self.password.as_ref(), &self.key_path);
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            let outcome = match timeout(self.connect_timeout, self.attempt(&credential)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Timeout(format!(
                    "no connection to {}:{} within {}s",
                    self.host,
                    self.port,
                    self.connect_timeout.as_secs()
                ))),
            };

            let err = match outcome {
                Ok((transport, channel)) => {
                    info!(
                        event = "sftp_connected",
                        host = %self.host,
                        username = %self.username,
                        attempt = attempt,
                        "SFTP remote connection successful"
                    );
                    self.connection = Connection::Connected { transport, channel };
                    return Ok(());
                }
                Err(err) => err,
            };

            if !err.is_recoverable() {
                error!(
                    event = "sftp_connect_aborted",
                    host = %self.host,
                    attempt = attempt,
                    error = %err,
                    "Connection attempt failed, not retrying"
                );
                self.connection = Connection::Failed;
                return Err(err);
            }

            warn!(
                event = "sftp_connect_failed",
                host = %self.host,
                attempt = attempt,
                error = %err,
                "Iteration {}: SFTP connection to {} failed",
                attempt,
                self.host
            );
            last_error = Some(err);
        }

        self.connection = Connection::Failed;
        Err(Error::ConnectionFailed {
            host: self.host.clone(),
            attempts: self.max_attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// One connection attempt. A transport opened here is closed again if the
    /// attempt fails after opening it.
    async fn attempt(
        &self,
        credential: &Credential,
    ) -> Result<(Box<dyn Transport>, Box<dyn SftpChannel>)> {
        let mut transport = self.connector.open(&self.host, self.port).await?;

        match credential {
            Credential::Password(_) => info!(
                method = credential.method(),
                "Connecting to sftp host {} as {} using password",
                self.host,
                self.username
            ),
            Credential::PrivateKey(key_path) => info!(
                method = credential.method(),
                key_path = %key_path.display(),
                "Connecting to sftp host {} as {} using RSA key",
                self.host,
                self.username
            ),
        }

        match establish(transport.as_mut(), &self.username, credential).await {
            Ok(channel) => Ok((transport, channel)),
            Err(err) => {
                if let Err(close_err) = transport.close().await {
                    debug!(error = %close_err, "Failed to close transport after failed attempt");
                }
                Err(err)
            }
        }
    }

    /// Copy a local file to `remote_path` (which must include the file name)
    ///
    /// Connects first if the handle has not connected yet. Returns the number
    /// of bytes written.
    ///
    /// # Errors
    ///
    /// - [`Error::LocalFileNotFound`] if `local_path` is not an existing regular file
    /// - any error from [`connect`](Self::connect) on the first use
    /// - [`Error::UploadFailed`] if no channel is available or the remote write fails
    /// - [`Error::SessionClosed`] after [`close`](Self::close)
    pub async fn upload(&mut self, local_path: &Path, remote_path: &str) -> Result<u64> {
        match tokio::fs::metadata(local_path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(Error::LocalFileNotFound(local_path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::LocalFileNotFound(local_path.to_path_buf()))
            }
            Err(e) => return Err(Error::Io(e)),
        }

        if matches!(self.connection, Connection::Unconnected) {
            self.connect().await?;
        }

        let channel = match &mut self.connection {
            Connection::Connected { channel, .. } => channel,
            Connection::Closed => return Err(Error::SessionClosed),
            Connection::Unconnected | Connection::Failed => {
                return Err(Error::upload_failed(format!(
                    "no SFTP channel to {}",
                    self.host
                )))
            }
        };

        let bytes = channel.put(local_path, remote_path).await?;

        info!(
            event = "file_uploaded",
            local = %local_path.display(),
            remote = %remote_path,
            bytes = bytes,
            "File: '{}' uploaded successfully",
            remote_path
        );

        Ok(bytes)
    }

    /// Close the SFTP channel, then the transport
    ///
    /// A no-op on a handle that never connected or is already closed. The
    /// handle cannot reconnect afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first error from closing the channel or the transport.
    /// Both are always attempted.
    pub async fn close(&mut self) -> Result<()> {
        let connection = std::mem::replace(&mut self.connection, Connection::Closed);

        let Connection::Connected {
            mut transport,
            mut channel,
        } = connection
        else {
            debug!(host = %self.host, "Close on a session without a connection");
            return Ok(());
        };

        info!(host = %self.host, "Closing SFTP session and its underlying channel");

        let channel_result = channel.close().await;
        let transport_result = transport.close().await;

        channel_result?;
        transport_result?;

        info!(host = %self.host, "Session closed");
        Ok(())
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if matches!(self.connection, Connection::Connected { .. }) {
            warn!(
                "Session to {}:{} dropped without close; connection torn down",
                self.host, self.port
            );
        }
    }
}

async fn establish(
    transport: &mut dyn Transport,
    username: &str,
    credential: &Credential,
) -> Result<Box<dyn SftpChannel>> {
    transport.authenticate(username, credential).await?;
    transport.open_sftp().await
}
