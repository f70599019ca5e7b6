//! A scriptable broker cluster for exercising the coordinator without a
//! real wire connection. Gated behind the `test-util` feature so it never
//! ships in ordinary builds, mirroring how async runtimes expose their own
//! mock clocks and channels for downstream tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RequestError;
use crate::node::{CreatedNode, HostPort, Node, NodeEvent, NodeFactory};
use crate::protocol::MetadataResponse;

#[derive(Default)]
struct Shared {
    responses: Mutex<HashMap<HostPort, VecDeque<Result<MetadataResponse, RequestError>>>>,
    events: Mutex<HashMap<HostPort, mpsc::Sender<NodeEvent>>>,
    created: Mutex<Vec<HostPort>>,
}

/// A cluster of scripted brokers. Construct one, queue up the metadata
/// responses each broker should hand back, then pass
/// [`MockCluster::factory`] to a [`crate::CoordinatorBuilder`].
#[derive(Default, Clone)]
pub struct MockCluster {
    shared: Arc<Shared>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> Arc<dyn NodeFactory> {
        Arc::new(MockFactory {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Queues a metadata response the broker at `host:port` will hand back
    /// the next time it is asked, in FIFO order.
    pub fn push_metadata(&self, host: &str, port: u16, response: MetadataResponse) {
        self.push(host, port, Ok(response));
    }

    /// Queues an error the broker at `host:port` will hand back the next
    /// time it is asked.
    pub fn push_error(&self, host: &str, port: u16, err: RequestError) {
        self.push(host, port, Err(err));
    }

    fn push(&self, host: &str, port: u16, outcome: Result<MetadataResponse, RequestError>) {
        self.shared
            .responses
            .lock()
            .unwrap()
            .entry(HostPort::new(host, port))
            .or_default()
            .push_back(outcome);
    }

    /// Emits a node event from the broker at `host:port`, as if its
    /// connection had observed it. Returns `false` if that broker was
    /// never created (or has already been stopped and dropped its
    /// sender).
    pub async fn emit(&self, host: &str, port: u16, event: NodeEvent) -> bool {
        let sender = self
            .shared
            .events
            .lock()
            .unwrap()
            .get(&HostPort::new(host, port))
            .cloned();

        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Every `(host, port)` the factory has created a node for, in
    /// creation order. Creating the same broker twice is recorded twice.
    pub fn created_nodes(&self) -> Vec<HostPort> {
        self.shared.created.lock().unwrap().clone()
    }
}

struct MockFactory {
    shared: Arc<Shared>,
}

#[async_trait]
impl NodeFactory for MockFactory {
    async fn create(&self, host: &str, port: u16) -> Result<CreatedNode, RequestError> {
        let host_port = HostPort::new(host, port);
        let (events_tx, events_rx) = mpsc::channel(64);

        self.shared
            .events
            .lock()
            .unwrap()
            .insert(host_port.clone(), events_tx);
        self.shared.created.lock().unwrap().push(host_port.clone());

        let node = Arc::new(ScriptedNode {
            name: host_port.to_string(),
            host_port,
            shared: Arc::clone(&self.shared),
        });

        Ok(CreatedNode {
            node,
            events: events_rx,
        })
    }
}

#[derive(Debug)]
struct ScriptedNode {
    name: String,
    host_port: HostPort,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}

#[async_trait]
impl Node for ScriptedNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_metadata(&self, _topic: Option<&str>) -> Result<MetadataResponse, RequestError> {
        self.shared
            .responses
            .lock()
            .unwrap()
            .entry(self.host_port.clone())
            .or_default()
            .pop_front()
            .unwrap_or_else(|| {
                Err(RequestError::Connect(format!(
                    "mock cluster has no scripted response left for {}",
                    self.host_port
                )))
            })
    }

    async fn stop(&self) {
        self.shared.events.lock().unwrap().remove(&self.host_port);
    }
}
