//! Scripted in-memory transport used as a mock SFTP server

#![allow(dead_code)]

use async_trait::async_trait;
use sftp_put::{Connector, Credential, Error, Result, SftpChannel, Transport};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What a single connection attempt does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// TCP connect is refused
    Refused,
    /// Handshake succeeds but the SFTP subsystem fails to start
    SubsystemFails,
    /// Server rejects the credentials
    Rejected,
    /// Everything succeeds
    Succeeds,
    /// Never completes
    Hangs,
}

/// Everything the mock server observed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open { host: String, port: u16 },
    AuthPassword { username: String },
    AuthKey { username: String, key_path: PathBuf },
    OpenSftp,
    Put { remote_path: String },
    ChannelClosed,
    TransportClosed,
}

#[derive(Default)]
struct State {
    script: VecDeque<Attempt>,
    fallback: Option<Attempt>,
    events: Vec<Event>,
    files: HashMap<String, Vec<u8>>,
    fail_puts: bool,
}

/// Connector whose attempts follow a script
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<State>>,
}

impl MockServer {
    /// Attempts follow `script`; once it runs out, every attempt does `fallback`
    pub fn scripted(script: &[Attempt], fallback: Attempt) -> Self {
        let server = Self::default();
        {
            let mut state = server.state.lock().expect("mock state");
            state.script = script.iter().copied().collect();
            state.fallback = Some(fallback);
        }
        server
    }

    pub fn accepting() -> Self {
        Self::scripted(&[], Attempt::Succeeds)
    }

    pub fn refusing() -> Self {
        Self::scripted(&[], Attempt::Refused)
    }

    pub fn fail_puts(&self) {
        self.state.lock().expect("mock state").fail_puts = true;
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().expect("mock state").events.clone()
    }

    pub fn open_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Open { .. }))
            .count()
    }

    pub fn file(&self, remote_path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .expect("mock state")
            .files
            .get(remote_path)
            .cloned()
    }

    fn record(&self, event: Event) {
        self.state.lock().expect("mock state").events.push(event);
    }

    fn next_attempt(&self) -> Attempt {
        let mut state = self.state.lock().expect("mock state");
        let fallback = state.fallback.unwrap_or(Attempt::Succeeds);
        state.script.pop_front().unwrap_or(fallback)
    }
}

#[async_trait]
impl Connector for MockServer {
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn Transport>> {
        self.record(Event::Open {
            host: host.to_string(),
            port,
        });

        match self.next_attempt() {
            Attempt::Refused => Err(Error::Connection("connection refused".into())),
            Attempt::Hangs => std::future::pending().await,
            behavior => Ok(Box::new(MockTransport {
                server: self.clone(),
                behavior,
            })),
        }
    }
}

struct MockTransport {
    server: MockServer,
    behavior: Attempt,
}

#[async_trait]
impl Transport for MockTransport {
    async fn authenticate(&mut self, username: &str, credential: &Credential) -> Result<()> {
        let event = match credential {
            Credential::Password(_) => Event::AuthPassword {
                username: username.to_string(),
            },
            Credential::PrivateKey(path) => Event::AuthKey {
                username: username.to_string(),
                key_path: path.clone(),
            },
        };
        self.server.record(event);

        if self.behavior == Attempt::Rejected {
            return Err(Error::Authentication("server rejected credentials".into()));
        }
        Ok(())
    }

    async fn open_sftp(&mut self) -> Result<Box<dyn SftpChannel>> {
        self.server.record(Event::OpenSftp);

        if self.behavior == Attempt::SubsystemFails {
            return Err(Error::Sftp("subsystem request failed".into()));
        }
        Ok(Box::new(MockChannel {
            server: self.server.clone(),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.server.record(Event::TransportClosed);
        Ok(())
    }
}

struct MockChannel {
    server: MockServer,
}

#[async_trait]
impl SftpChannel for MockChannel {
    async fn put(&mut self, local_path: &Path, remote_path: &str) -> Result<u64> {
        self.server.record(Event::Put {
            remote_path: remote_path.to_string(),
        });

        if self.server.state.lock().expect("mock state").fail_puts {
            return Err(Error::upload_failed(format!(
                "Failed to open remote file {}: permission denied",
                remote_path
            )));
        }

        let content = tokio::fs::read(local_path).await?;
        let bytes = content.len() as u64;
        self.server
            .state
            .lock()
            .expect("mock state")
            .files
            .insert(remote_path.to_string(), content);
        Ok(bytes)
    }

    async fn close(&mut self) -> Result<()> {
        self.server.record(Event::ChannelClosed);
        Ok(())
    }
}
