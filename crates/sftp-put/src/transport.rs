//! Transport seam between the session handle and the SSH library
//!
//! [`Connector`], [`Transport`] and [`SftpChannel`] mirror the three layers a
//! session goes through: a TCP/SSH connection to `host:port`, an authenticated
//! transport, and the SFTP subsystem on top of it. The russh implementation
//! lives here; tests substitute scripted ones.

use crate::auth::{load_private_key, Credential};
use crate::config::{ClientConfig, HostKeyPolicy};
use crate::host_keys::verify_host_key;
use crate::{Error, Result};
use async_trait::async_trait;
use russh::client::{self, Handle, Handler};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey};
use russh::Disconnect;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Opens transports to a remote host
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open an unauthenticated transport to `host:port`
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn Transport>>;
}

/// An established SSH transport
#[async_trait]
pub trait Transport: Send {
    /// Authenticate `username` with exactly the given credential
    async fn authenticate(&mut self, username: &str, credential: &Credential) -> Result<()>;

    /// Start the SFTP subsystem on an authenticated transport
    async fn open_sftp(&mut self) -> Result<Box<dyn SftpChannel>>;

    /// Tear the transport down
    async fn close(&mut self) -> Result<()>;
}

/// An SFTP session able to store files
#[async_trait]
pub trait SftpChannel: Send {
    /// Copy the local file to `remote_path`, replacing any existing file.
    /// Returns the number of bytes written.
    async fn put(&mut self, local_path: &Path, remote_path: &str) -> Result<u64>;

    /// End the SFTP session
    async fn close(&mut self) -> Result<()>;
}

/// [`Connector`] backed by russh
pub struct RusshConnector {
    config: Arc<client::Config>,
    host_key_policy: HostKeyPolicy,
    known_hosts_path: PathBuf,
}

impl RusshConnector {
    /// Create a connector using the host key settings from `config`
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            config: Arc::new(client::Config {
                inactivity_timeout: Some(Duration::from_secs(300)),
                ..Default::default()
            }),
            host_key_policy: config.host_key_policy,
            known_hosts_path: config.resolved_known_hosts_path(),
        }
    }
}

#[async_trait]
impl Connector for RusshConnector {
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn Transport>> {
        // `[::1]` style targets carry brackets that the resolver does not accept
        let address = host.trim_start_matches('[').trim_end_matches(']');

        debug!("Connecting to {}:{}", address, port);

        let handler = ClientHandler {
            host: host.to_string(),
            port,
            host_key_policy: self.host_key_policy,
            known_hosts_path: self.known_hosts_path.clone(),
        };

        let handle = client::connect(self.config.clone(), (address, port), handler).await?;

        Ok(Box::new(RusshTransport { handle }))
    }
}

/// russh client callbacks; only host key checking is customized
struct ClientHandler {
    host: String,
    port: u16,
    host_key_policy: HostKeyPolicy,
    known_hosts_path: PathBuf,
}

impl Handler for ClientHandler {
    type Error = Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool> {
        verify_host_key(
            self.host_key_policy,
            &self.host,
            self.port,
            server_public_key,
            &self.known_hosts_path,
        )
    }
}

struct RusshTransport {
    handle: Handle<ClientHandler>,
}

#[async_trait]
impl Transport for RusshTransport {
    async fn authenticate(&mut self, username: &str, credential: &Credential) -> Result<()> {
        let result = match credential {
            Credential::Password(password) => {
                self.handle
                    .authenticate_password(username, password.expose_secret())
                    .await?
            }
            Credential::PrivateKey(key_path) => {
                let key = load_private_key(key_path)?;
                let hash_alg = self.handle.best_supported_rsa_hash().await?.flatten();
                self.handle
                    .authenticate_publickey(
                        username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await?
            }
        };

        if !result.success() {
            return Err(Error::Authentication(format!(
                "server rejected {} authentication for {}",
                credential.method(),
                username
            )));
        }

        Ok(())
    }

    async fn open_sftp(&mut self) -> Result<Box<dyn SftpChannel>> {
        let channel = self.handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;

        let sftp = SftpSession::new(channel.into_stream()).await?;

        debug!("SFTP channel initialized successfully");
        Ok(Box::new(RusshSftpChannel { sftp }))
    }

    async fn close(&mut self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}

struct RusshSftpChannel {
    sftp: SftpSession,
}

#[async_trait]
impl SftpChannel for RusshSftpChannel {
    async fn put(&mut self, local_path: &Path, remote_path: &str) -> Result<u64> {
        let mut local = tokio::fs::File::open(local_path).await.map_err(|e| {
            Error::upload_failed(format!(
                "Failed to read local file {}: {}",
                local_path.display(),
                e
            ))
        })?;

        let mut remote = self
            .sftp
            .open_with_flags(
                remote_path,
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            )
            .await
            .map_err(|e| {
                Error::upload_failed(format!("Failed to open remote file {}: {}", remote_path, e))
            })?;

        let bytes = tokio::io::copy(&mut local, &mut remote).await.map_err(|e| {
            Error::upload_failed(format!(
                "Failed to upload {} to {}: {}",
                local_path.display(),
                remote_path,
                e
            ))
        })?;

        // Closes the remote handle; the server commits the write here
        remote.shutdown().await.map_err(|e| {
            Error::upload_failed(format!("Failed to close remote file {}: {}", remote_path, e))
        })?;

        Ok(bytes)
    }

    async fn close(&mut self) -> Result<()> {
        self.sftp.close().await?;
        Ok(())
    }
}
