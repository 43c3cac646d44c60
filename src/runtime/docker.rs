use super::ContainerRuntime;
use crate::error::RuntimeError;
use crate::types::{ContainerRecord, RawEvent};
use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerInspectResponse, EventMessage};
use bollard::system::EventsOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

pub struct DockerRuntime {
    docker: Docker,
    network_name: Option<String>,
    reconnect_delay: Duration,
}

impl DockerRuntime {
    /// Connects to the local Docker daemon (unix socket on Linux).
    ///
    /// With `network_name` set, container addresses are taken from that
    /// network; otherwise the default bridge address is used.
    pub fn connect(
        network_name: Option<String>,
        reconnect_delay: Duration,
    ) -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker,
            network_name,
            reconnect_delay,
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_running(&self) -> Result<Vec<ContainerRecord>, RuntimeError> {
        let opts = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(opts)).await?;

        let mut records = Vec::with_capacity(containers.len());
        for c in containers {
            let Some(id) = c.id else { continue };
            match self.resolve(&id).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!("Container {} vanished during scan", id),
                Err(e) => warn!("Failed to inspect container {}: {}", id, e),
            }
        }
        Ok(records)
    }

    async fn resolve(&self, id: &str) -> Result<Option<ContainerRecord>, RuntimeError> {
        match self.docker.inspect_container(id, None).await {
            Ok(detail) => Ok(Some(record_from_inspect(
                id,
                &detail,
                self.network_name.as_deref(),
            ))),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn watch(
        &self,
        mut since: i64,
        event_tx: mpsc::Sender<RawEvent>,
    ) -> Result<(), RuntimeError> {
        loop {
            let mut stream = self.docker.events(Some(events_options(since)));

            info!("Listening for Docker events since {}...", since);
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(event) => {
                        // Resume from here after a reconnect; replays are harmless.
                        if let Some(time) = event.time {
                            since = since.max(time);
                        }
                        let raw = raw_event(event);
                        debug!("Container event: {:?} for {:?}", raw.status, raw.id);
                        if event_tx.send(raw).await.is_err() {
                            return Err(RuntimeError::Closed);
                        }
                    }
                    Err(e) => {
                        error!("Error in Docker event stream: {}", e);
                        break;
                    }
                }
            }

            if event_tx.is_closed() {
                return Err(RuntimeError::Closed);
            }
            warn!(
                "Docker event stream ended. Reconnecting in {:?}...",
                self.reconnect_delay
            );
            sleep(self.reconnect_delay).await;
        }
    }
}

fn events_options(since: i64) -> EventsOptions<String> {
    EventsOptions::<String> {
        since: Some(since.to_string()),
        filters: HashMap::from([("type".to_string(), vec!["container".to_string()])]),
        ..Default::default()
    }
}

fn raw_event(event: EventMessage) -> RawEvent {
    RawEvent {
        status: event.action,
        id: event.actor.and_then(|actor| actor.id),
    }
}

fn record_from_inspect(
    id: &str,
    detail: &ContainerInspectResponse,
    network_name: Option<&str>,
) -> ContainerRecord {
    ContainerRecord {
        id: detail.id.clone().unwrap_or_else(|| id.to_string()),
        name: detail
            .name
            .as_deref()
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        ip_address: get_ip(detail, network_name).unwrap_or_default(),
    }
}

fn get_ip(detail: &ContainerInspectResponse, network_name: Option<&str>) -> Option<String> {
    let settings = detail.network_settings.as_ref()?;
    let Some(network_name) = network_name else {
        return settings.ip_address.clone().filter(|ip| !ip.is_empty());
    };

    let net = settings.networks.as_ref()?.get(network_name)?;
    if let Some(ipv4) = &net.ip_address {
        if !ipv4.is_empty() {
            return Some(ipv4.clone());
        }
    }
    if let Some(ipv6) = &net.global_ipv6_address {
        if !ipv6.is_empty() {
            return Some(ipv6.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{EndpointSettings, EventActor, NetworkSettings};

    fn inspect(bridge_ip: &str, networks: &[(&str, &str)]) -> ContainerInspectResponse {
        let networks = networks
            .iter()
            .map(|(name, ip)| {
                (
                    name.to_string(),
                    EndpointSettings {
                        ip_address: Some(ip.to_string()),
                        ..Default::default()
                    },
                )
            })
            .collect();
        ContainerInspectResponse {
            id: Some("c0ffee".into()),
            name: Some("/web".into()),
            network_settings: Some(NetworkSettings {
                ip_address: Some(bridge_ip.into()),
                networks: Some(networks),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn default_bridge_address() {
        let detail = inspect("172.17.0.2", &[("backend", "172.20.0.4")]);
        let record = record_from_inspect("c0ffee", &detail, None);
        assert_eq!(record, ContainerRecord::new("c0ffee", "web", "172.17.0.2"));
    }

    #[test]
    fn named_network_address() {
        let detail = inspect("", &[("backend", "172.20.0.4")]);
        assert_eq!(get_ip(&detail, Some("backend")).as_deref(), Some("172.20.0.4"));
        assert_eq!(get_ip(&detail, Some("frontend")), None);
        assert_eq!(get_ip(&detail, None), None);
    }

    #[test]
    fn event_maps_action_and_actor() {
        let event = EventMessage {
            action: Some("start".into()),
            actor: Some(EventActor {
                id: Some("c1".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(raw_event(event), RawEvent::new("start", "c1"));
        assert_eq!(raw_event(EventMessage::default()), RawEvent::default());
    }

    #[test]
    fn subscription_starts_at_given_time() {
        let opts = events_options(1_700_000_000);
        assert_eq!(opts.since.as_deref(), Some("1700000000"));
        assert_eq!(opts.filters.get("type"), Some(&vec!["container".to_string()]));
    }
}
