//! Applies container state changes to the hosts-file.

use log::{info, warn};

use crate::error::HostsError;
use crate::hosts::HostsFile;
use crate::types::{ContainerRecord, HostEntry};

pub struct Reconciler {
    hosts: HostsFile,
}

impl Reconciler {
    pub fn new(hosts: HostsFile) -> Self {
        Self { hosts }
    }

    pub fn hosts(&self) -> &HostsFile {
        &self.hosts
    }

    /// Startup pass: drop every managed entry left over from a previous
    /// run, then make sure the block markers exist.
    pub async fn prepare(&self) -> Result<(), HostsError> {
        let stale = self.hosts.remove_host(None).await?;
        if stale > 0 {
            info!("Removed {} stale entries from {}", stale, self.hosts.path().display());
        }
        self.hosts.ensure_markers().await?;
        Ok(())
    }

    /// Records a started container.
    ///
    /// Returns `None` without touching the file when the container has no
    /// name or no address.  An existing entry for the same hostname is
    /// replaced, so a restart with a new IP never leaves two lines.
    pub async fn apply_start(&self, name: &str, ip: &str) -> Result<Option<HostEntry>, HostsError> {
        if name.trim().is_empty() || ip.trim().is_empty() {
            warn!(
                "Container {:?} has no resolvable name or address ({:?}), not adding",
                name, ip
            );
            return Ok(None);
        }

        let (entry, replaced) = self.hosts.replace_host(name, ip).await?;
        if replaced > 0 {
            info!("Updated {} -> {}", entry.hostname, entry.ip);
        } else {
            info!("Added {} -> {}", entry.hostname, entry.ip);
        }
        Ok(Some(entry))
    }

    /// Removes the entry of a stopped container.  Returns the number of
    /// lines dropped.
    pub async fn apply_stop(&self, name: &str) -> Result<usize, HostsError> {
        if name.trim().is_empty() {
            warn!("Stopped container has no name, nothing to remove");
            return Ok(0);
        }
        let removed = self.hosts.remove_host(Some(name)).await?;
        info!("Removed {}.{} ({} line(s))", name, self.hosts.domain(), removed);
        Ok(removed)
    }

    /// Bulk-seed: adds every addressable container.  Returns how many
    /// entries were written.
    pub async fn seed_all(&self, containers: &[ContainerRecord]) -> Result<usize, HostsError> {
        let mut added = 0;
        for container in containers {
            if !container.is_addressable() {
                info!(
                    "Skipping container {} ({:?}): no name or address",
                    container.id,
                    container.name()
                );
                continue;
            }
            if self
                .apply_start(container.name(), container.ip_address())
                .await?
                .is_some()
            {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Flushes the whole managed block.
    pub async fn clear(&self) -> Result<usize, HostsError> {
        self.hosts.remove_host(None).await
    }
}
