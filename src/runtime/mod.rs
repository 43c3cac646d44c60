use crate::error::RuntimeError;
use crate::types::{ContainerRecord, RawEvent};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod docker;
pub use docker::DockerRuntime;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Currently running containers with their name and address.
    async fn list_running(&self) -> Result<Vec<ContainerRecord>, RuntimeError>;

    /// Looks up a container by id.  `Ok(None)` means the runtime no longer
    /// knows it (removed between the event and the lookup).
    async fn resolve(&self, id: &str) -> Result<Option<ContainerRecord>, RuntimeError>;

    /// Streams lifecycle events into `event_tx` until the receiver is
    /// dropped, starting with events that happened at or after `since`
    /// (unix seconds).
    async fn watch(
        &self,
        since: i64,
        event_tx: mpsc::Sender<RawEvent>,
    ) -> Result<(), RuntimeError>;
}
