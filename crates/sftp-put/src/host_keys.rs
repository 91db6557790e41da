//! Server host key verification against known_hosts
//!
//! NIST 800-53: IA-3 (Device Identification and Authentication), SC-23 (Session Authenticity)
//! Implementation: The server's key is checked against the user's known_hosts
//! file before any credential is sent.

use crate::config::HostKeyPolicy;
use crate::{Error, Result};
use russh::keys::PublicKey;
use std::path::Path;
use tracing::{debug, info, warn};

/// Decide whether to trust `server_key` for `host:port`
///
/// # Errors
///
/// Returns [`Error::HostKey`] when the key is unknown under
/// [`HostKeyPolicy::Strict`], when it differs from the recorded key, or when
/// known_hosts cannot be read or updated.
pub fn verify_host_key(
    policy: HostKeyPolicy,
    host: &str,
    port: u16,
    server_key: &PublicKey,
    known_hosts_path: &Path,
) -> Result<bool> {
    if policy == HostKeyPolicy::Off {
        warn!(
            event = "host_key_unchecked",
            host = %host,
            port = port,
            "Host key checking disabled, accepting server key"
        );
        return Ok(true);
    }

    let known = known_hosts_path.exists()
        && russh::keys::check_known_hosts_path(host, port, server_key, known_hosts_path)
            .map_err(|e| {
                Error::HostKey(format!(
                    "{}:{} does not match {}: {}",
                    host,
                    port,
                    known_hosts_path.display(),
                    e
                ))
            })?;

    if known {
        debug!(host = %host, port = port, "Host key verified");
        return Ok(true);
    }

    match policy {
        HostKeyPolicy::Strict => Err(Error::HostKey(format!(
            "{}:{} is not in {}",
            host,
            port,
            known_hosts_path.display()
        ))),
        HostKeyPolicy::AcceptNew | HostKeyPolicy::Off => {
            if let Some(parent) = known_hosts_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::HostKey(format!(
                        "Failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }

            russh::keys::known_hosts::learn_known_hosts_path(
                host,
                port,
                server_key,
                known_hosts_path,
            )
            .map_err(|e| {
                Error::HostKey(format!(
                    "Failed to write {}: {}",
                    known_hosts_path.display(),
                    e
                ))
            })?;

            info!(
                event = "host_key_learned",
                host = %host,
                port = port,
                known_hosts = %known_hosts_path.display(),
                "Permanently added host key to known hosts"
            );
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const KEY_A: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";
    const KEY_B: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJm";

    fn key(base64: &str) -> PublicKey {
        russh::keys::parse_public_key_base64(base64).expect("valid ed25519 key")
    }

    #[test]
    fn test_off_accepts_anything() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("known_hosts");

        let result = verify_host_key(HostKeyPolicy::Off, "examplehost", 22, &key(KEY_A), &path);
        assert!(matches!(result, Ok(true)));
        assert!(!path.exists());
    }

    #[test]
    fn test_strict_rejects_unknown_host() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("known_hosts");

        let result = verify_host_key(HostKeyPolicy::Strict, "examplehost", 22, &key(KEY_A), &path);
        assert!(matches!(result, Err(Error::HostKey(_))));
    }

    #[test]
    fn test_accept_new_learns_then_verifies() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("ssh").join("known_hosts");

        let first = verify_host_key(HostKeyPolicy::AcceptNew, "examplehost", 22, &key(KEY_A), &path);
        assert!(matches!(first, Ok(true)));
        assert!(path.exists());

        let strict = verify_host_key(HostKeyPolicy::Strict, "examplehost", 22, &key(KEY_A), &path);
        assert!(matches!(strict, Ok(true)));
    }

    #[test]
    fn test_accept_new_rejects_changed_key() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("known_hosts");

        verify_host_key(HostKeyPolicy::AcceptNew, "examplehost", 22, &key(KEY_A), &path)
            .expect("first key is learned");

        let changed = verify_host_key(HostKeyPolicy::AcceptNew, "examplehost", 22, &key(KEY_B), &path);
        assert!(matches!(changed, Err(Error::HostKey(_))));
    }
}
