//! The coordinator's public API: construction, lifecycle, and the two
//! request operations offered to callers.

mod agent;
mod refresher;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::config::CoordinatorConfig;
use crate::error::Error;
use crate::node::{HostPort, NodeFactory};
use crate::registry::{BrokerMeta, BrokerRegistry};
use crate::router::{ConsumeRouter, NoopConsumeRouter, NoopProduceRouter, ProduceRouter};
use crate::routing::RoutingTable;
use crate::seeds;
use crate::stats::{Statistics, StatisticsSnapshot};

use agent::{AgentState, Message};

/// Builds a [`Coordinator`], mirroring the fluent style of a client
/// builder: required collaborators up front, optional ones as setters.
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    factory: Arc<dyn NodeFactory>,
    produce_router: Option<Arc<dyn ProduceRouter>>,
    consume_router: Option<Arc<dyn ConsumeRouter>>,
}

impl CoordinatorBuilder {
    pub fn new(seeds: impl Into<String>, factory: Arc<dyn NodeFactory>) -> Self {
        Self {
            config: CoordinatorConfig::new(seeds),
            factory,
            produce_router: None,
            consume_router: None,
        }
    }

    pub fn client_id(mut self, client_id: impl Into<Arc<str>>) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    pub fn metadata_refresh_interval_ms(mut self, ms: u64) -> Self {
        self.config.metadata_refresh_interval_ms = ms;
        self
    }

    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.config.mailbox_capacity = capacity;
        self
    }

    pub fn produce_router(mut self, router: Arc<dyn ProduceRouter>) -> Self {
        self.produce_router = Some(router);
        self
    }

    pub fn consume_router(mut self, router: Arc<dyn ConsumeRouter>) -> Self {
        self.consume_router = Some(router);
        self
    }

    /// Parses the seed list and materializes a connection to each seed
    /// broker. Tolerates individual seed failures as long as at least one
    /// seed connects; fails only if none do.
    pub async fn build(self) -> Result<Coordinator, Error> {
        let seeds = seeds::parse_seeds(&self.config.seeds)?;
        let mut registry = BrokerRegistry::new();
        let (mailbox_tx, mailbox_rx) = mpsc::channel(self.config.mailbox_capacity);

        for (host, port) in &seeds {
            match self.factory.create(host, *port).await {
                Ok(created) => {
                    let host_port = HostPort::new(host.clone(), *port);
                    registry.insert(
                        BrokerMeta {
                            id: None,
                            host: host.clone(),
                            port: *port,
                        },
                        Arc::clone(&created.node),
                    );
                    agent::spawn_node_event_forwarder(
                        host_port.clone(),
                        host_port.to_string(),
                        created.events,
                        mailbox_tx.clone(),
                    );
                }
                Err(err) => {
                    tracing::error!(host, port, error = %err, "failed to connect to seed broker");
                }
            }
        }

        if registry.is_empty() {
            return Err(Error::InvalidSeeds {
                seeds: self.config.seeds.clone(),
                reason: "failed to connect to any seed broker".to_string(),
            });
        }

        let routing_handle = Arc::new(RwLock::new(Arc::new(RoutingTable::default())));
        let (routing_change_tx, _) = broadcast::channel(16);
        let (internal_error_tx, _) = broadcast::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(Statistics::default());

        let produce_router = self
            .produce_router
            .unwrap_or_else(|| Arc::new(NoopProduceRouter) as Arc<dyn ProduceRouter>);
        let consume_router = self
            .consume_router
            .unwrap_or_else(|| Arc::new(NoopConsumeRouter) as Arc<dyn ConsumeRouter>);

        let state = AgentState {
            registry,
            factory: Arc::clone(&self.factory),
            seeds,
            stats: Arc::clone(&stats),
            routing_handle: Arc::clone(&routing_handle),
            routing_change_tx: routing_change_tx.clone(),
            internal_error_tx: internal_error_tx.clone(),
            produce_router: Arc::clone(&produce_router),
            consume_router: Arc::clone(&consume_router),
            mailbox_tx: mailbox_tx.clone(),
        };

        let agent_task = tokio::spawn(agent::run(state, mailbox_rx, shutdown_rx));

        Ok(Coordinator {
            mailbox_tx,
            shutdown_tx,
            routing_handle,
            routing_change_tx,
            internal_error_tx,
            stats,
            produce_router,
            consume_router,
            refresh_interval: Duration::from_millis(self.config.metadata_refresh_interval_ms),
            inner: AsyncMutex::new(CoordinatorInner {
                state: CoordinatorState::Created,
                agent_task: Some(agent_task),
                refresher_task: None,
            }),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordinatorState {
    Created,
    Started,
    Stopped,
}

struct CoordinatorInner {
    state: CoordinatorState,
    agent_task: Option<JoinHandle<()>>,
    refresher_task: Option<JoinHandle<()>>,
}

/// Owns the broker registry and routing table for one cluster, reachable
/// only through its mailbox.
pub struct Coordinator {
    mailbox_tx: mpsc::Sender<Message>,
    shutdown_tx: watch::Sender<bool>,
    routing_handle: Arc<RwLock<Arc<RoutingTable>>>,
    routing_change_tx: broadcast::Sender<Arc<RoutingTable>>,
    internal_error_tx: broadcast::Sender<Arc<Error>>,
    stats: Arc<Statistics>,
    produce_router: Arc<dyn ProduceRouter>,
    consume_router: Arc<dyn ConsumeRouter>,
    refresh_interval: Duration,
    inner: AsyncMutex<CoordinatorInner>,
}

impl Coordinator {
    pub fn builder(seeds: impl Into<String>, factory: Arc<dyn NodeFactory>) -> CoordinatorBuilder {
        CoordinatorBuilder::new(seeds, factory)
    }

    /// Performs the first metadata fetch and starts the periodic
    /// refresher. Idempotent once started; fails if the coordinator has
    /// already been stopped.
    pub async fn start(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CoordinatorState::Started => return Ok(()),
            CoordinatorState::Stopped => return Err(Error::Stopped),
            CoordinatorState::Created => {}
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox_tx
            .send(Message::FullMetadata {
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| Error::Stopped)?;
        let _ = reply_rx.await.map_err(|_| Error::Stopped)??;

        let refresher_task = refresher::spawn(self.mailbox_tx.clone(), self.refresh_interval);
        inner.refresher_task = Some(refresher_task);
        inner.state = CoordinatorState::Started;
        Ok(())
    }

    /// Tears the coordinator down in order: cancel the timer, stop the
    /// consume then produce routers, let the agent drain its mailbox and
    /// stop every remaining node, then return.
    pub async fn stop(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if inner.state == CoordinatorState::Stopped {
            return Ok(());
        }

        if let Some(refresher_task) = inner.refresher_task.take() {
            refresher_task.abort();
        }

        self.consume_router.stop().await;
        self.produce_router.stop().await;

        let _ = self.shutdown_tx.send(true);

        if let Some(agent_task) = inner.agent_task.take() {
            let _ = agent_task.await;
        }

        inner.state = CoordinatorState::Stopped;
        Ok(())
    }

    /// Requests a fresh full-cluster metadata fetch and returns the
    /// resulting routing table.
    pub async fn require_new_routing_table(&self) -> Result<Arc<RoutingTable>, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox_tx
            .send(Message::FullMetadata {
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| Error::Stopped)?;
        reply_rx.await.map_err(|_| Error::Stopped)?
    }

    /// Requests the partition ids of a single topic from a live broker.
    pub async fn require_all_partitions_for_topic(
        &self,
        topic: impl Into<String>,
    ) -> Result<Vec<i32>, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox_tx
            .send(Message::TopicMetadata {
                topic: topic.into(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::Stopped)?;
        reply_rx.await.map_err(|_| Error::Stopped)?
    }

    /// The most recently published routing table, read without going
    /// through the mailbox. An immutable snapshot, wholesale replaced on
    /// every reconciliation.
    pub fn routing_table(&self) -> Arc<RoutingTable> {
        self.routing_handle.read().clone()
    }

    /// Subscribes to every future routing-table replacement.
    pub fn subscribe_routing_changes(&self) -> broadcast::Receiver<Arc<RoutingTable>> {
        self.routing_change_tx.subscribe()
    }

    /// Subscribes to non-cancellation errors surfaced while servicing
    /// waiters.
    pub fn subscribe_internal_errors(&self) -> broadcast::Receiver<Arc<Error>> {
        self.internal_error_tx.subscribe()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }
}
