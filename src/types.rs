//! Data structures shared between the runtime adapter, the hosts-file
//! store and the event dispatcher.
//!
//! Container records and raw events are ephemeral: they live for the
//! duration of a single event or a single bulk-seed item and are never
//! persisted.  The hosts-file itself is the only durable state.

use std::fmt;

/// One managed mapping in the hosts-file.
///
/// `hostname` is the fully qualified name (`<container>.<suffix>`) and is
/// the identity of the entry.  The IP address may change over the
/// lifetime of a container (restart with a new address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub ip: String,
    pub hostname: String,
}

impl HostEntry {
    pub fn new(name: &str, ip: &str, domain: &str) -> Self {
        Self {
            ip: ip.trim().to_string(),
            hostname: format!("{}.{}", name.trim(), domain),
        }
    }
}

impl fmt::Display for HostEntry {
    /// Renders the hosts-file line body: the address left-aligned in a
    /// 15 character column, one space, then the hostname.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<15} {}", self.ip, self.hostname)
    }
}

/// Lifecycle transition reported by the container runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Start,
    Stop,
    /// Any other action (`die`, `exec_start`, `health_status`, ...).
    Other(String),
}

impl ContainerStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "start" => Self::Start,
            "stop" => Self::Stop,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Stop => f.write_str("stop"),
            Self::Other(action) => f.write_str(action),
        }
    }
}

/// An event as delivered by the runtime's event stream, before any
/// filtering.  Either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub status: Option<String>,
    pub id: Option<String>,
}

impl RawEvent {
    pub fn new(status: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            id: Some(id.into()),
        }
    }

    /// The event's status, or `None` when the field is absent or blank.
    pub fn status(&self) -> Option<ContainerStatus> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ContainerStatus::parse)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.is_empty())
    }
}

/// A container as resolved from the runtime for one event or one
/// bulk-seed item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub ip_address: String,
}

impl ContainerRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ip_address: ip.into(),
        }
    }

    /// Container name without the runtime's leading slash; empty if unknown.
    pub fn name(&self) -> &str {
        self.name.trim_start_matches('/')
    }

    /// Address on the watched network; empty if the container has none.
    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    /// True when both name and address are present, i.e. the container
    /// can be represented as a hosts-file entry.
    pub fn is_addressable(&self) -> bool {
        !self.name().trim().is_empty() && !self.ip_address.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_pads_address_to_fifteen_columns() {
        let entry = HostEntry::new("api", "10.0.0.5", "docker");
        assert_eq!(entry.to_string(), "10.0.0.5        api.docker");

        let long = HostEntry::new("db", "fd00::1234:5678:9abc", "docker");
        assert_eq!(long.to_string(), "fd00::1234:5678:9abc db.docker");
    }

    #[test]
    fn raw_event_without_status_is_unrecognised() {
        let event = RawEvent {
            status: None,
            id: Some("c1".into()),
        };
        assert_eq!(event.status(), None);

        let blank = RawEvent {
            status: Some("  ".into()),
            id: Some("c1".into()),
        };
        assert_eq!(blank.status(), None);
    }

    #[test]
    fn status_parsing() {
        assert_eq!(RawEvent::new("start", "c1").status(), Some(ContainerStatus::Start));
        assert_eq!(RawEvent::new("stop", "c1").status(), Some(ContainerStatus::Stop));
        assert_eq!(
            RawEvent::new("die", "c1").status(),
            Some(ContainerStatus::Other("die".into()))
        );
    }

    #[test]
    fn record_strips_leading_slash() {
        let record = ContainerRecord::new("c1", "/web", "172.17.0.2");
        assert_eq!(record.name(), "web");
        assert!(record.is_addressable());
        assert!(!ContainerRecord::new("c2", "/cache", "").is_addressable());
    }
}
