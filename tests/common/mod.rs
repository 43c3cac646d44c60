//! Test doubles shared by the dispatcher contract tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dockerdns::error::{NotifyError, RuntimeError};
use dockerdns::notifier::ProcessTable;
use dockerdns::runtime::ContainerRuntime;
use dockerdns::types::{ContainerRecord, RawEvent};
use dockerdns::{Dispatcher, HostsFile, Notifier, Reconciler};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// In-memory container runtime whose event stream is driven by the test.
pub struct FakeRuntime {
    containers: Mutex<HashMap<String, (ContainerRecord, bool)>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<RawEvent>>>,
    resolve_calls: AtomicUsize,
    list_calls: AtomicUsize,
    /// Unix second at which the first listing was taken.
    listed_at: Mutex<Option<i64>>,
    /// `since` handed to `watch`.
    watch_since: Mutex<Option<i64>>,
}

impl FakeRuntime {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<RawEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = Self {
            containers: Mutex::new(HashMap::new()),
            events: Mutex::new(Some(rx)),
            resolve_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            listed_at: Mutex::new(None),
            watch_since: Mutex::new(None),
        };
        (Arc::new(runtime), tx)
    }

    /// Registers a running container.
    pub fn run(&self, id: &str, name: &str, ip: &str) {
        self.containers.lock().unwrap().insert(
            id.to_string(),
            (ContainerRecord::new(id, format!("/{}", name), ip), true),
        );
    }

    /// Marks a container stopped: it keeps its name but loses its address.
    pub fn halt(&self, id: &str) {
        if let Some((record, running)) = self.containers.lock().unwrap().get_mut(id) {
            record.ip_address.clear();
            *running = false;
        }
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn listed_at(&self) -> Option<i64> {
        *self.listed_at.lock().unwrap()
    }

    pub fn watch_since(&self) -> Option<i64> {
        *self.watch_since.lock().unwrap()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_running(&self) -> Result<Vec<ContainerRecord>, RuntimeError> {
        self.listed_at.lock().unwrap().get_or_insert(unix_now());
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let containers = self.containers.lock().unwrap();
        let mut running: Vec<ContainerRecord> = containers
            .values()
            .filter(|(_, running)| *running)
            .map(|(record, _)| record.clone())
            .collect();
        running.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(running)
    }

    async fn resolve(&self, id: &str) -> Result<Option<ContainerRecord>, RuntimeError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .containers
            .lock()
            .unwrap()
            .get(id)
            .map(|(record, _)| record.clone()))
    }

    async fn watch(
        &self,
        since: i64,
        event_tx: mpsc::Sender<RawEvent>,
    ) -> Result<(), RuntimeError> {
        *self.watch_since.lock().unwrap() = Some(since);
        let rx = self.events.lock().unwrap().take();
        let Some(mut rx) = rx else {
            return Ok(());
        };
        while let Some(event) = rx.recv().await {
            if event_tx.send(event).await.is_err() {
                return Err(RuntimeError::Closed);
            }
        }
        Ok(())
    }
}

/// Process table that always finds the process and counts SIGHUPs.
#[derive(Clone, Default)]
pub struct CountingProcessTable {
    hangups: Arc<AtomicUsize>,
}

impl CountingProcessTable {
    pub fn hangups(&self) -> usize {
        self.hangups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessTable for CountingProcessTable {
    async fn find_pid(&self, _name: &str) -> Result<Option<i32>, NotifyError> {
        Ok(Some(4242))
    }

    fn send_hangup(&self, _pid: i32) -> Result<(), NotifyError> {
        self.hangups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub const BASE_HOSTS: &str = "127.0.0.1       localhost\n::1             localhost ip6-localhost\n# local network\n10.1.1.1        nas.lan\n";

pub struct Harness {
    pub dir: TempDir,
    pub hosts: HostsFile,
    pub runtime: Arc<FakeRuntime>,
    pub events: mpsc::UnboundedSender<RawEvent>,
    pub table: CountingProcessTable,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("hosts");
        tokio::fs::write(&path, BASE_HOSTS).await.expect("seed hosts file");

        let (runtime, events) = FakeRuntime::new();
        Self {
            hosts: HostsFile::new(path, "docker"),
            dir,
            runtime,
            events,
            table: CountingProcessTable::default(),
        }
    }

    /// Dispatcher over this harness, notifying "dnsmasq".  The managed
    /// block is prepared the way the binary does at startup.
    pub async fn dispatcher(&self) -> Dispatcher {
        let reconciler = Reconciler::new(self.hosts.clone());
        reconciler.prepare().await.expect("prepare hosts file");
        let notifier = Notifier::new(Some("dnsmasq".into()), Box::new(self.table.clone()));
        Dispatcher::new(self.runtime.clone(), reconciler, notifier, 16)
    }

    pub async fn content(&self) -> String {
        tokio::fs::read_to_string(self.hosts.path())
            .await
            .expect("read hosts file")
    }

    pub async fn hostnames(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .hosts
            .entries()
            .await
            .expect("read entries")
            .into_iter()
            .map(|e| e.hostname)
            .collect();
        names.sort();
        names
    }

    pub fn send(&self, status: &str, id: &str) {
        self.events
            .send(RawEvent::new(status, id))
            .expect("dispatcher is listening");
    }
}

/// Polls `check` until it returns true or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs() as i64
}
