//! Transforms a metadata response into an immutable routing table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::node::Node;
use crate::protocol::MetadataResponse;
use crate::registry::BrokerRegistry;

/// One partition within a topic: its id and the node currently leading it.
/// Partitions within a topic are strictly increasing by id.
#[derive(Clone)]
pub struct Partition {
    pub id: i32,
    pub leader: Arc<dyn Node>,
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("id", &self.id)
            .field("leader", &self.leader.name())
            .finish()
    }
}

/// An immutable snapshot mapping each routable topic to its ordered
/// partitions. Never mutated after publication; a new table wholesale
/// replaces the old one.
#[derive(Debug, Default)]
pub struct RoutingTable {
    topics: HashMap<String, Vec<Partition>>,
}

impl RoutingTable {
    pub fn partitions(&self, topic: &str) -> Option<&[Partition]> {
        self.topics.get(topic).map(Vec::as_slice)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Builds a new [`RoutingTable`] from `response`, resolving each
/// partition's leader against `registry`.
pub fn build_routing_table(registry: &BrokerRegistry, response: &MetadataResponse) -> RoutingTable {
    let mut topics = HashMap::with_capacity(response.topics.len());

    for topic in &response.topics {
        if !topic.error.is_ok_for_clients() {
            continue;
        }

        let mut partitions: Vec<Partition> = topic
            .partitions
            .iter()
            .filter(|p| p.error.is_ok_for_clients() && p.leader_id >= 0)
            .filter_map(|p| {
                registry.node_by_id(p.leader_id).map(|leader| Partition {
                    id: p.partition_index,
                    leader,
                })
            })
            .collect();

        partitions.sort_by_key(|p| p.id);
        topics.insert(topic.name.clone(), partitions);
    }

    RoutingTable { topics }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use crate::node::Node;
    use crate::protocol::{
        MetadataResponseBroker, MetadataResponsePartition, MetadataResponseTopic, ProtocolErrorCode,
    };
    use crate::registry::BrokerMeta;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct StubNode(&'static str);

    #[async_trait]
    impl Node for StubNode {
        fn name(&self) -> &str {
            self.0
        }

        async fn fetch_metadata(
            &self,
            _topic: Option<&str>,
        ) -> Result<MetadataResponse, RequestError> {
            unimplemented!()
        }

        async fn stop(&self) {}
    }

    fn registry_with(brokers: &[(i32, &str, u16)]) -> BrokerRegistry {
        let mut registry = BrokerRegistry::new();
        for (id, host, port) in brokers {
            registry.insert(
                BrokerMeta {
                    id: Some(*id),
                    host: host.to_string(),
                    port: *port,
                },
                Arc::new(StubNode(Box::leak(host.to_string().into_boxed_str()))),
            );
        }
        registry
    }

    #[test]
    fn includes_ok_partitions_sorted_by_id() {
        let registry = registry_with(&[(1, "h1", 9092), (2, "h2", 9092)]);
        let response = MetadataResponse {
            brokers: vec![
                MetadataResponseBroker {
                    node_id: 1,
                    host: "h1".into(),
                    port: 9092,
                },
                MetadataResponseBroker {
                    node_id: 2,
                    host: "h2".into(),
                    port: 9092,
                },
            ],
            topics: vec![MetadataResponseTopic {
                name: "T".into(),
                error: ProtocolErrorCode::NONE,
                partitions: vec![
                    MetadataResponsePartition {
                        partition_index: 1,
                        leader_id: 2,
                        error: ProtocolErrorCode::NONE,
                    },
                    MetadataResponsePartition {
                        partition_index: 0,
                        leader_id: 1,
                        error: ProtocolErrorCode::NONE,
                    },
                ],
            }],
        };

        let table = build_routing_table(&registry, &response);
        let partitions = table.partitions("T").unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].id, 0);
        assert_eq!(partitions[1].id, 1);
    }

    #[test]
    fn drops_partition_with_negative_leader() {
        let registry = registry_with(&[(1, "h1", 9092)]);
        let response = MetadataResponse {
            brokers: vec![],
            topics: vec![MetadataResponseTopic {
                name: "T".into(),
                error: ProtocolErrorCode::NONE,
                partitions: vec![
                    MetadataResponsePartition {
                        partition_index: 0,
                        leader_id: 1,
                        error: ProtocolErrorCode::NONE,
                    },
                    MetadataResponsePartition {
                        partition_index: 1,
                        leader_id: -1,
                        error: ProtocolErrorCode::NONE,
                    },
                ],
            }],
        };

        let table = build_routing_table(&registry, &response);
        let partitions = table.partitions("T").unwrap();
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].id, 0);
    }

    #[test]
    fn drops_topic_with_error_code() {
        let registry = registry_with(&[(1, "h1", 9092)]);
        let response = MetadataResponse {
            brokers: vec![],
            topics: vec![MetadataResponseTopic {
                name: "T".into(),
                error: ProtocolErrorCode::new(3),
                partitions: vec![MetadataResponsePartition {
                    partition_index: 0,
                    leader_id: 1,
                    error: ProtocolErrorCode::NONE,
                }],
            }],
        };

        let table = build_routing_table(&registry, &response);
        assert!(table.partitions("T").is_none());
    }
}
