//! Best-effort SIGHUP to a dependent process (dnsmasq and friends) after
//! the hosts-file changed.

use async_trait::async_trait;
use log::{info, warn};
use tokio::process::Command;

use crate::error::NotifyError;

/// Access to the host's process table.
#[async_trait]
pub trait ProcessTable: Send + Sync {
    /// Current pid of the process called `name`, if one is running.
    async fn find_pid(&self, name: &str) -> Result<Option<i32>, NotifyError>;

    /// Delivers SIGHUP to `pid`.
    fn send_hangup(&self, pid: i32) -> Result<(), NotifyError>;
}

/// Looks processes up with `pidof -s` and signals them with `kill(2)`.
pub struct SystemProcessTable;

#[async_trait]
impl ProcessTable for SystemProcessTable {
    async fn find_pid(&self, name: &str) -> Result<Option<i32>, NotifyError> {
        let output = Command::new("pidof")
            .arg("-s")
            .arg(name)
            .output()
            .await
            .map_err(|source| NotifyError::Lookup {
                name: name.to_string(),
                source,
            })?;

        // pidof exits non-zero when nothing matches
        if !output.status.success() {
            return Ok(None);
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|pid| *pid > 0))
    }

    #[cfg(unix)]
    fn send_hangup(&self, pid: i32) -> Result<(), NotifyError> {
        // SAFETY: kill(2) with a positive pid and a valid signal number has
        // no memory-safety requirements.
        let result = unsafe { libc::kill(pid, libc::SIGHUP) };
        if result == 0 {
            return Ok(());
        }
        Err(NotifyError::Signal {
            pid,
            source: std::io::Error::last_os_error(),
        })
    }

    #[cfg(not(unix))]
    fn send_hangup(&self, pid: i32) -> Result<(), NotifyError> {
        Err(NotifyError::Signal {
            pid,
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "SIGHUP is only available on unix",
            ),
        })
    }
}

pub struct Notifier {
    process: Option<String>,
    table: Box<dyn ProcessTable>,
}

impl Notifier {
    pub fn new(process: Option<String>, table: Box<dyn ProcessTable>) -> Self {
        Self {
            process: process.filter(|p| !p.trim().is_empty()),
            table,
        }
    }

    pub fn system(process: Option<String>) -> Self {
        Self::new(process, Box::new(SystemProcessTable))
    }

    pub fn process(&self) -> Option<&str> {
        self.process.as_deref()
    }

    /// Signals the configured process.  Never fails; returns whether a
    /// signal was actually delivered.
    pub async fn notify(&self) -> bool {
        let Some(name) = self.process.as_deref() else {
            return false;
        };

        let pid = match self.table.find_pid(name).await {
            Ok(Some(pid)) => pid,
            Ok(None) => {
                warn!("PID of process <{}> not found, not notified", name);
                return false;
            }
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };

        match self.table.send_hangup(pid) {
            Ok(()) => {
                info!("SIGHUP > {}:{}", name, pid);
                true
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }
}
