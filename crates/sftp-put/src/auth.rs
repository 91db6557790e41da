//! Credential selection and private key loading
//!
//! NIST 800-53: IA-2 (Identification and Authentication), IA-5 (Authenticator Management)
//! Implementation: Exactly one authentication method is chosen per session; the
//! password is held as a secret and never logged.

use crate::{Error, Result};
use russh::keys::PrivateKey;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Credential presented to the server
pub enum Credential {
    /// Username + password authentication
    Password(SecretString),
    /// Public key authentication with the private key at this path
    PrivateKey(PathBuf),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.debug_tuple("Password").field(&"[REDACTED]").finish(),
            Credential::PrivateKey(path) => f.debug_tuple("PrivateKey").field(path).finish(),
        }
    }
}

impl Credential {
    /// Choose the credential for a session
    ///
    /// A non-empty password selects password authentication; otherwise the
    /// key at `key_path` is used. Never both.
    pub fn select(password: Option<&SecretString>, key_path: &Path) -> Self {
        match password {
            Some(password) if !password.expose_secret().is_empty() => {
                Credential::Password(SecretString::from(password.expose_secret()))
            }
            _ => Credential::PrivateKey(key_path.to_path_buf()),
        }
    }

    /// Method name as used in SSH and in log fields
    pub fn method(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::PrivateKey(_) => "publickey",
        }
    }
}

/// Load a private key from disk
///
/// The file is checked before decoding so that the common mistakes (missing
/// file, `.pub` file, non-PEM content) get a specific message.
///
/// # Errors
///
/// Returns [`Error::KeyFile`] if the file is unreadable, holds a public key,
/// is not a PEM private key, or cannot be decoded (including keys that need a
/// passphrase).
pub fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::KeyFile(format!("Cannot read key file {}: {}", path.display(), e))
    })?;

    let first_line = content.lines().next().unwrap_or("").trim();

    if first_line.starts_with("ssh-") || first_line.starts_with("ecdsa-") {
        return Err(Error::KeyFile(format!(
            "File {} contains a PUBLIC key, not a private key",
            path.display()
        )));
    }

    if !first_line.starts_with("-----BEGIN") {
        return Err(Error::KeyFile(format!(
            "File {} does not appear to be a PEM private key",
            path.display()
        )));
    }

    let key = russh::keys::decode_secret_key(&content, None).map_err(|e| {
        Error::KeyFile(format!("Failed to load key {}: {}", path.display(), e))
    })?;

    debug!(
        key_path = %path.display(),
        algorithm = %key.algorithm().as_str(),
        "Loaded private key"
    );

    Ok(key)
}
