//! The single-consumer mailbox and the agent that serializes every
//! mutation of the registry and routing table.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{error, info, warn};

use crate::error::{Error, RequestError};
use crate::node::{HostPort, NodeEvent, NodeFactory};
use crate::protocol::MetadataResponse;
use crate::registry::{BrokerMeta, BrokerRegistry};
use crate::router::{ConsumeAck, ConsumeRouter, ProduceAck, ProduceRouter};
use crate::routing::{self, RoutingTable};
use crate::stats::Statistics;
use crate::topology;

/// The three logical payload kinds the mailbox carries: a full-metadata
/// request, a topic-scoped metadata request, and a node event. Kept as a
/// proper tagged enum rather than a closure so the kind of every queued
/// message stays inspectable.
pub enum Message {
    FullMetadata {
        reply: Option<oneshot::Sender<Result<Arc<RoutingTable>, Error>>>,
    },
    TopicMetadata {
        topic: String,
        reply: oneshot::Sender<Result<Vec<i32>, Error>>,
    },
    NodeEvent(NodeAction),
}

/// A node event translated into something the agent can act on.
pub enum NodeAction {
    Dead { host_port: HostPort },
    ConnectError { node_name: String },
    ReadError { node_name: String, detail: String },
    WriteError { node_name: String, detail: String },
    DecodeError { node_name: String, detail: String },
    Connected { node_name: String },
    RequestSent,
    ResponseReceived,
    ProduceAck(ProduceAck),
    FetchAck(ConsumeAck),
    OffsetAck(ConsumeAck),
}

/// Forwards one node's raw events into the agent mailbox as tagged
/// [`NodeAction`]s, until the node closes its event channel (expected once
/// [`crate::node::Node::stop`] completes) or the mailbox is gone.
pub(crate) fn spawn_node_event_forwarder(
    host_port: HostPort,
    node_name: String,
    mut events: mpsc::Receiver<NodeEvent>,
    mailbox: mpsc::Sender<Message>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let action = match event {
                NodeEvent::Dead => NodeAction::Dead {
                    host_port: host_port.clone(),
                },
                NodeEvent::ConnectError(_) => NodeAction::ConnectError {
                    node_name: node_name.clone(),
                },
                NodeEvent::ReadError(detail) => NodeAction::ReadError {
                    node_name: node_name.clone(),
                    detail,
                },
                NodeEvent::WriteError(detail) => NodeAction::WriteError {
                    node_name: node_name.clone(),
                    detail,
                },
                NodeEvent::DecodeError(detail) => NodeAction::DecodeError {
                    node_name: node_name.clone(),
                    detail,
                },
                NodeEvent::Connected => NodeAction::Connected {
                    node_name: node_name.clone(),
                },
                NodeEvent::RequestSent => NodeAction::RequestSent,
                NodeEvent::ResponseReceived => NodeAction::ResponseReceived,
                NodeEvent::ProduceAck(ack) => NodeAction::ProduceAck(ack),
                NodeEvent::FetchAck(ack) => NodeAction::FetchAck(ack),
                NodeEvent::OffsetAck(ack) => NodeAction::OffsetAck(ack),
            };

            if mailbox.send(Message::NodeEvent(action)).await.is_err() {
                break;
            }
        }
    });
}

/// Everything the agent owns exclusively. Only ever touched from the
/// single task running [`run`].
pub(crate) struct AgentState {
    pub registry: BrokerRegistry,
    pub factory: Arc<dyn NodeFactory>,
    pub seeds: Vec<(String, u16)>,
    pub stats: Arc<Statistics>,
    pub routing_handle: Arc<RwLock<Arc<RoutingTable>>>,
    pub routing_change_tx: broadcast::Sender<Arc<RoutingTable>>,
    pub internal_error_tx: broadcast::Sender<Arc<Error>>,
    pub produce_router: Arc<dyn ProduceRouter>,
    pub consume_router: Arc<dyn ConsumeRouter>,
    pub mailbox_tx: mpsc::Sender<Message>,
}

impl AgentState {
    async fn handle(&mut self, message: Message) {
        match message {
            Message::FullMetadata { reply } => self.handle_full_metadata(reply).await,
            Message::TopicMetadata { topic, reply } => {
                self.handle_topic_metadata(topic, reply).await
            }
            Message::NodeEvent(action) => self.handle_node_event(action).await,
        }
    }

    async fn handle_full_metadata(
        &mut self,
        reply: Option<oneshot::Sender<Result<Arc<RoutingTable>, Error>>>,
    ) {
        self.check_no_more_nodes().await;

        let Some(node) = self.registry.pick_random() else {
            self.fail_waiter(reply, RequestError::Cancelled);
            return;
        };

        match node.fetch_metadata(None).await {
            Ok(response) => {
                let table = self.reconcile_and_publish(response).await;
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(table));
                }
                self.check_no_more_nodes().await;
            }
            Err(err) => self.fail_waiter(reply, err),
        }
    }

    async fn handle_topic_metadata(
        &mut self,
        topic: String,
        reply: oneshot::Sender<Result<Vec<i32>, Error>>,
    ) {
        self.check_no_more_nodes().await;

        let Some(node) = self.registry.pick_random() else {
            self.fail_waiter(Some(reply), RequestError::Cancelled);
            return;
        };

        match node.fetch_metadata(Some(&topic)).await {
            Ok(response) => {
                let ids = response
                    .topics
                    .iter()
                    .find(|t| t.name == topic)
                    .map(|t| t.partitions.iter().map(|p| p.partition_index).collect())
                    .unwrap_or_default();
                let _ = reply.send(Ok(ids));
            }
            Err(err) => self.fail_waiter(Some(reply), err),
        }
    }

    /// On cancellation, just resolve the waiter as cancelled; on any other
    /// error, also fan the real cause out on `InternalError`.
    fn fail_waiter<T>(&self, reply: Option<oneshot::Sender<Result<T, Error>>>, err: RequestError) {
        let is_cancelled = matches!(err, RequestError::Cancelled);

        if let Some(reply) = reply {
            let _ = reply.send(Err(Error::cancelled(err.to_string())));
        }

        if !is_cancelled {
            let _ = self.internal_error_tx.send(Arc::new(Error::Request(err)));
        }
    }

    async fn handle_node_event(&mut self, action: NodeAction) {
        match action {
            NodeAction::Dead { host_port } => {
                if let Some(node) = self.registry.remove_by_host_port(&host_port) {
                    self.stats.node_dead();
                    node.stop().await;
                }
                self.check_no_more_nodes().await;
                let _ = self
                    .mailbox_tx
                    .send(Message::FullMetadata { reply: None })
                    .await;
            }
            NodeAction::ConnectError { node_name } => {
                warn!(node = %node_name, "failed to connect, retrying");
                self.stats.errors();
            }
            NodeAction::ReadError { node_name, detail } => {
                error!(node = %node_name, detail, "transport read error");
                self.stats.errors();
            }
            NodeAction::WriteError { node_name, detail } => {
                error!(node = %node_name, detail, "transport write error");
                self.stats.errors();
            }
            NodeAction::DecodeError { node_name, detail } => {
                error!(node = %node_name, detail, "failed to decode response");
                self.stats.errors();
            }
            NodeAction::Connected { node_name } => {
                info!(node = %node_name, "connected");
            }
            NodeAction::RequestSent => self.stats.requests_sent(),
            NodeAction::ResponseReceived => self.stats.responses_received(),
            NodeAction::ProduceAck(ack) => {
                self.stats.successful_sent();
                self.produce_router.acknowledge(ack).await;
            }
            NodeAction::FetchAck(ack) => {
                self.stats.received();
                self.consume_router.acknowledge(ack).await;
            }
            NodeAction::OffsetAck(ack) => {
                self.stats.received();
                self.consume_router.acknowledge(ack).await;
            }
        }
    }

    async fn reconcile_and_publish(&mut self, response: MetadataResponse) -> Arc<RoutingTable> {
        let mailbox_tx = self.mailbox_tx.clone();
        let result = topology::reconcile(
            &mut self.registry,
            self.factory.as_ref(),
            &response.brokers,
            |new_node| {
                let node_name = new_node.host_port.to_string();
                spawn_node_event_forwarder(
                    new_node.host_port,
                    node_name,
                    new_node.events,
                    mailbox_tx.clone(),
                );
            },
        )
        .await;

        if let Err(err) = result {
            self.stats.errors();
            error!(error = %err, "failed to reconcile cluster topology");
            let _ = self.internal_error_tx.send(Arc::new(err));
        }

        let table = Arc::new(routing::build_routing_table(&self.registry, &response));
        *self.routing_handle.write() = Arc::clone(&table);
        let _ = self.routing_change_tx.send(Arc::clone(&table));
        self.produce_router.change_routing_table(Arc::clone(&table));
        self.consume_router.change_routing_table(Arc::clone(&table));

        table
    }

    /// The cluster's last-resort recovery: if the registry ever becomes
    /// empty, re-materialize the seed nodes.
    async fn check_no_more_nodes(&mut self) {
        if !self.registry.is_empty() {
            return;
        }

        error!("no brokers left in the registry, falling back to seeds");

        for (host, port) in self.seeds.clone() {
            match self.factory.create(&host, port).await {
                Ok(created) => {
                    let host_port = HostPort::new(host.clone(), port);
                    self.registry.insert(
                        BrokerMeta {
                            id: None,
                            host: host.clone(),
                            port,
                        },
                        Arc::clone(&created.node),
                    );
                    spawn_node_event_forwarder(
                        host_port.clone(),
                        host_port.to_string(),
                        created.events,
                        self.mailbox_tx.clone(),
                    );
                }
                Err(err) => {
                    error!(host, port, error = %err, "failed to reconnect to seed");
                    self.stats.errors();
                }
            }
        }
    }
}

/// Runs the agent to completion: processes messages strictly in arrival
/// order until told to shut down, drains whatever is already queued, stops
/// every remaining node, then returns.
pub(crate) async fn run(
    mut state: AgentState,
    mut mailbox: mpsc::Receiver<Message>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            maybe_message = mailbox.recv() => {
                match maybe_message {
                    Some(message) => state.handle(message).await,
                    None => break,
                }
            }
        }
    }

    while let Ok(message) = mailbox.try_recv() {
        state.handle(message).await;
    }

    for node in state.registry.drain_nodes() {
        node.stop().await;
    }

    state.stats.exited();
}
