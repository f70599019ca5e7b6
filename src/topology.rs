//! Diffs a freshly received broker list against the registry and mutates
//! it in place to match.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::Error;
use crate::node::{HostPort, Node, NodeEvent, NodeFactory};
use crate::protocol::MetadataResponseBroker;
use crate::registry::{BrokerMeta, BrokerRegistry};

/// A node the reconciler just created, along with its event stream. Handed
/// to `on_new_node` as soon as the node is registered, so the caller can
/// wire up event forwarding for it immediately rather than after the whole
/// broker list has been processed.
pub struct NewNode {
    pub host_port: HostPort,
    pub events: mpsc::Receiver<NodeEvent>,
}

/// Reconciles `registry` against the brokers advertised in a metadata
/// response, creating nodes for newly seen brokers via `factory` and
/// dropping (and stopping) nodes for brokers no longer advertised.
///
/// `on_new_node` is invoked synchronously for each newly created node, right
/// after it is registered. Driving the callback inline (rather than
/// collecting into a `Vec` and returning it at the end) means a broker
/// further down the list that fails to connect can't strand the nodes
/// already committed to the registry earlier in the same pass without
/// forwarding wired up for them.
pub async fn reconcile(
    registry: &mut BrokerRegistry,
    factory: &dyn NodeFactory,
    brokers: &[MetadataResponseBroker],
    mut on_new_node: impl FnMut(NewNode),
) -> Result<(), Error> {
    let advertised_host_ports: HashSet<HostPort> = brokers
        .iter()
        .map(|b| HostPort::new(b.host.clone(), b.port))
        .collect();
    let advertised_ids: HashSet<i32> = brokers.iter().map(|b| b.node_id).collect();

    for broker in brokers {
        let host_port = HostPort::new(broker.host.clone(), broker.port);

        let slot = match registry.slot_by_host_port(&host_port) {
            Some(slot) => slot,
            None => {
                let created = factory
                    .create(&broker.host, broker.port)
                    .await
                    .map_err(|source| Error::NodeFactory {
                        host: broker.host.clone(),
                        port: broker.port,
                        source: Box::new(source),
                    })?;
                info!(host = %broker.host, port = broker.port, "discovered new broker");

                registry.insert(
                    BrokerMeta {
                        id: None,
                        host: broker.host.clone(),
                        port: broker.port,
                    },
                    Arc::clone(&created.node),
                );
                on_new_node(NewNode {
                    host_port: host_port.clone(),
                    events: created.events,
                });

                registry
                    .slot_by_host_port(&host_port)
                    .expect("just inserted")
            }
        };

        registry.set_id(slot, broker.node_id);
    }

    registry.retain_ids(|id| advertised_ids.contains(id));

    let dropped = registry.retain_host_ports(|hp| advertised_host_ports.contains(hp));
    for node in dropped {
        stop_dropped_node(node.as_ref()).await;
    }

    Ok(())
}

async fn stop_dropped_node(node: &dyn Node) {
    warn!(node = node.name(), "stopping broker dropped from topology");
    node.stop().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use crate::protocol::MetadataResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct StubNode(String);

    #[async_trait]
    impl Node for StubNode {
        fn name(&self) -> &str {
            &self.0
        }

        async fn fetch_metadata(
            &self,
            _topic: Option<&str>,
        ) -> Result<MetadataResponse, RequestError> {
            unimplemented!()
        }

        async fn stop(&self) {}
    }

    struct CountingFactory {
        created: AtomicUsize,
        stopped: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NodeFactory for CountingFactory {
        async fn create(
            &self,
            host: &str,
            port: u16,
        ) -> Result<crate::node::CreatedNode, RequestError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            let (_tx, rx) = mpsc::channel(1);
            Ok(crate::node::CreatedNode {
                node: Arc::new(StubNode(format!("{host}:{port}"))),
                events: rx,
            })
        }
    }

    fn broker(id: i32, host: &str, port: u16) -> MetadataResponseBroker {
        MetadataResponseBroker {
            node_id: id,
            host: host.to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn creates_nodes_for_newly_advertised_brokers() {
        let mut registry = BrokerRegistry::new();
        let factory = CountingFactory {
            created: AtomicUsize::new(0),
            stopped: Mutex::new(vec![]),
        };

        let mut new_nodes = Vec::new();
        reconcile(
            &mut registry,
            &factory,
            &[broker(1, "h1", 9092), broker(2, "h2", 9092)],
            |n| new_nodes.push(n),
        )
        .await
        .unwrap();

        assert_eq!(new_nodes.len(), 2);
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert!(registry.node_by_id(1).is_some());
        assert!(registry.node_by_id(2).is_some());
    }

    #[tokio::test]
    async fn preserves_node_identity_across_reconciliations() {
        let mut registry = BrokerRegistry::new();
        let factory = CountingFactory {
            created: AtomicUsize::new(0),
            stopped: Mutex::new(vec![]),
        };

        reconcile(&mut registry, &factory, &[broker(1, "h1", 9092)], |_| {})
            .await
            .unwrap();
        let node_before = registry.node_by_id(1).unwrap();

        // same broker advertised again: no new node should be created.
        let mut new_nodes = Vec::new();
        reconcile(&mut registry, &factory, &[broker(1, "h1", 9092)], |n| {
            new_nodes.push(n)
        })
        .await
        .unwrap();

        assert!(new_nodes.is_empty());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        let node_after = registry.node_by_id(1).unwrap();
        assert!(Arc::ptr_eq(&node_before, &node_after));
    }

    #[tokio::test]
    async fn drops_and_stops_nodes_no_longer_advertised() {
        let mut registry = BrokerRegistry::new();
        let factory = CountingFactory {
            created: AtomicUsize::new(0),
            stopped: Mutex::new(vec![]),
        };

        reconcile(
            &mut registry,
            &factory,
            &[broker(1, "h1", 9092), broker(2, "h2", 9092)],
            |_| {},
        )
        .await
        .unwrap();

        reconcile(&mut registry, &factory, &[broker(2, "h2", 9092)], |_| {})
            .await
            .unwrap();

        assert!(registry.node_by_id(1).is_none());
        assert!(registry.node_by_id(2).is_some());
        assert_eq!(registry.len(), 1);
    }
}
