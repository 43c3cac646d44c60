//! Error types for the hosts-file store, the runtime adapter and the
//! notifier.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single hosts-file operation.
#[derive(Debug, Error)]
pub enum HostsError {
    /// Hostname or IP address was empty after trimming.
    #[error("hostname and IP must not be empty (hostname: {hostname:?}, ip: {ip:?})")]
    Validation { hostname: String, ip: String },

    #[error("hosts file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HostsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures talking to the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("docker: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// The receiving side of the event channel went away.
    #[error("event channel closed")]
    Closed,
}

/// Failures delivering a change notification to a dependent process.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to look up process {name}: {source}")]
    Lookup {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Hosts(#[from] HostsError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
