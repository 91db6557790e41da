//! Parsing of the `user@host:remote-dir` destination argument

use crate::{Error, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Upload destination parsed from `user@host:remote-dir`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Login name on the remote host
    pub username: String,
    /// Remote host name or address
    pub host: String,
    /// Directory the file is placed in
    pub remote_dir: String,
}

impl RemoteTarget {
    /// Parse a destination string
    ///
    /// The string is split on its last `:` into `user@host` and the remote
    /// directory, then `user@host` is split on its first `@`. A remote
    /// directory that itself contains `:` therefore splits in the wrong place;
    /// the colon-free prefix ends up in the host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArguments`] when the `:` or `@` separator is
    /// missing, or when the username or host is empty.
    pub fn parse(spec: &str) -> Result<Self> {
        let (credentials, remote_dir) = spec.rsplit_once(':').ok_or_else(|| {
            Error::invalid_arguments(format!(
                "target '{}' is not of the form user@host:remote-dir",
                spec
            ))
        })?;

        let (username, host) = credentials.split_once('@').ok_or_else(|| {
            Error::invalid_arguments(format!("target '{}' is missing 'user@'", spec))
        })?;

        if username.is_empty() {
            return Err(Error::invalid_arguments(format!(
                "target '{}' has an empty username",
                spec
            )));
        }

        if host.is_empty() {
            return Err(Error::invalid_arguments(format!(
                "target '{}' has an empty host",
                spec
            )));
        }

        Ok(Self {
            username: username.to_string(),
            host: host.to_string(),
            remote_dir: remote_dir.to_string(),
        })
    }

    /// Remote path for a local file: the remote directory joined with the
    /// file's base name
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArguments`] if the local path has no file name
    /// component (e.g. `/` or `..`) or the file name is not valid UTF-8.
    pub fn remote_path_for(&self, local_path: &Path) -> Result<String> {
        let name = local_path.file_name().ok_or_else(|| {
            Error::invalid_arguments(format!(
                "'{}' does not name a file",
                local_path.display()
            ))
        })?;

        // SFTP paths are sent as UTF-8 strings
        let file_name = name.to_str().ok_or_else(|| {
            Error::invalid_arguments(format!(
                "file name of '{}' is not valid UTF-8",
                local_path.display()
            ))
        })?;

        if self.remote_dir.is_empty() {
            // Relative to the login directory, like scp's `host:`
            return Ok(file_name.to_string());
        }

        Ok(format!(
            "{}/{}",
            self.remote_dir.trim_end_matches('/'),
            file_name
        ))
    }
}

impl FromStr for RemoteTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.remote_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_target() {
        let target = RemoteTarget::parse("user@host.example.com:/remote/path").expect("valid target");

        assert_eq!(target.username, "user");
        assert_eq!(target.host, "host.example.com");
        assert_eq!(target.remote_dir, "/remote/path");
    }

    #[test]
    fn test_parse_splits_on_last_colon() {
        // The colon inside the remote path is taken as the separator
        let target = RemoteTarget::parse("user@host:/data/a:b").expect("parses");

        assert_eq!(target.username, "user");
        assert_eq!(target.host, "host:/data/a");
        assert_eq!(target.remote_dir, "b");
    }

    #[test]
    fn test_parse_bracketed_ipv6_host() {
        let target = RemoteTarget::parse("root@[::1]:/srv").expect("parses");

        assert_eq!(target.host, "[::1]");
        assert_eq!(target.remote_dir, "/srv");
    }

    #[test]
    fn test_parse_splits_on_first_at() {
        let target = RemoteTarget::parse("bob@corp@jump:/in").expect("parses");

        assert_eq!(target.username, "bob");
        assert_eq!(target.host, "corp@jump");
    }

    #[test]
    fn test_parse_missing_colon() {
        let result = RemoteTarget::parse("user@host");
        assert!(matches!(result, Err(Error::InvalidArguments(_))));
    }

    #[test]
    fn test_parse_missing_at() {
        let result = RemoteTarget::parse("host:/incoming");
        assert!(matches!(result, Err(Error::InvalidArguments(_))));
    }

    #[test]
    fn test_parse_empty_parts() {
        assert!(RemoteTarget::parse("@host:/x").is_err());
        assert!(RemoteTarget::parse("user@:/x").is_err());
    }

    #[test]
    fn test_remote_path_for() {
        let target = RemoteTarget::parse("bob@examplehost:/incoming").expect("valid target");

        assert_eq!(
            target
                .remote_path_for(Path::new("/tmp/work/report.csv"))
                .expect("has file name"),
            "/incoming/report.csv"
        );
    }

    #[test]
    fn test_remote_path_trailing_slash_not_doubled() {
        let target = RemoteTarget::parse("bob@examplehost:/incoming/").expect("valid target");
        assert_eq!(
            target.remote_path_for(Path::new("report.csv")).expect("has file name"),
            "/incoming/report.csv"
        );

        let root = RemoteTarget::parse("bob@examplehost:/").expect("valid target");
        assert_eq!(
            root.remote_path_for(Path::new("report.csv")).expect("has file name"),
            "/report.csv"
        );
    }

    #[test]
    fn test_remote_path_empty_dir_is_relative() {
        let target = RemoteTarget::parse("bob@examplehost:").expect("valid target");
        assert_eq!(
            target.remote_path_for(Path::new("report.csv")).expect("has file name"),
            "report.csv"
        );
    }

    #[test]
    fn test_remote_path_without_file_name() {
        let target = RemoteTarget::parse("bob@examplehost:/incoming").expect("valid target");
        assert!(target.remote_path_for(Path::new("/")).is_err());
        assert!(target.remote_path_for(Path::new("..")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_remote_path_non_utf8_file_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let target = RemoteTarget::parse("bob@examplehost:/incoming").expect("valid target");
        let local = Path::new("/tmp").join(OsStr::from_bytes(b"report\xff.csv"));

        let err = target
            .remote_path_for(&local)
            .expect_err("non-UTF-8 name is rejected");
        assert!(matches!(err, Error::InvalidArguments(_)));
        assert!(err.to_string().contains("not valid UTF-8"));
        assert!(!err.to_string().contains("does not name a file"));
    }

    #[test]
    fn test_display_round_trips() {
        let spec = "alice@examplehost:/data/drop";
        let target: RemoteTarget = spec.parse().expect("valid target");
        assert_eq!(target.to_string(), spec);
    }
}
