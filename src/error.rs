//! Fatal bootstrap errors
//!
//! Every variant here terminates the process with exit code 1. Degraded
//! failures (email alerting) are not errors and never appear here.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::daemon::pidfile::PidFileError;

/// Shared `Result` alias for the bootstrap sequence.
pub type Result<T> = std::result::Result<T, BootstrapError>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Invalid user '{user}' or group '{group}' given")]
    InvalidIdentity { user: String, group: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unable to detach into background: {}", describe_errno(.source))]
    Daemonize {
        #[source]
        source: nix::Error,
    },

    #[error("Unable to switch to group '{group}': {}", describe_errno(.source))]
    SetGid {
        group: String,
        #[source]
        source: nix::Error,
    },

    #[error("Unable to chroot to directory '{}': {}", .dir.display(), describe_errno(.source))]
    Chroot {
        dir: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("Unable to switch to user '{user}': {}", describe_errno(.source))]
    SetUid {
        user: String,
        #[source]
        source: nix::Error,
    },

    #[error("Unable to install signal handler for {signal}: {source}")]
    Signals {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    PidFile(#[from] PidFileError),
}

/// Render an errno as `(code) description`, e.g. `(1) Operation not permitted`.
pub fn describe_errno(errno: &nix::Error) -> String {
    format!("({}) {}", *errno as i32, errno.desc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;

    #[test]
    fn test_errno_description_includes_code_and_text() {
        let described = describe_errno(&Errno::EPERM);
        assert_eq!(described, "(1) Operation not permitted");
    }

    #[test]
    fn test_chroot_error_names_directory() {
        let err = BootstrapError::Chroot {
            dir: PathBuf::from("/var/lib/monitord"),
            source: Errno::ENOENT,
        };
        let message = err.to_string();
        assert!(message.contains("/var/lib/monitord"));
        assert!(message.contains("(2)"));
    }

    #[test]
    fn test_invalid_identity_names_both() {
        let err = BootstrapError::InvalidIdentity {
            user: "nobody-here".to_string(),
            group: "no-group".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid user 'nobody-here' or group 'no-group' given"
        );
    }
}
