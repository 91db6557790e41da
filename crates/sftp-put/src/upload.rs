//! One-shot upload: connect, put, always close

use crate::config::ClientConfig;
use crate::session::SessionHandle;
use crate::target::RemoteTarget;
use crate::transport::Connector;
use crate::Result;
use secrecy::SecretString;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Result of a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// Path the file was written to on the server
    pub remote_path: String,
    /// Number of bytes written
    pub bytes: u64,
}

/// Upload `local_path` into the directory named by `target`
///
/// The session is closed on every path out of this function, including
/// failed uploads. A failure to close after a successful upload is logged,
/// not returned.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidArguments`] if `local_path` has no file
/// name, and otherwise whatever [`SessionHandle::upload`] returns.
pub async fn upload_file(
    local_path: &Path,
    target: &RemoteTarget,
    password: Option<SecretString>,
    config: &ClientConfig,
    connector: Arc<dyn Connector>,
) -> Result<UploadReport> {
    let remote_path = target.remote_path_for(local_path)?;

    let mut session = SessionHandle::from_config(target, password, config, connector);
    let uploaded = session.upload(local_path, &remote_path).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close session cleanly");
    }

    let bytes = uploaded?;
    Ok(UploadReport { remote_path, bytes })
}
