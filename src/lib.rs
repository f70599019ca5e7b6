//! Tracks which brokers make up a Kafka-protocol cluster and how to reach
//! each partition's leader.
//!
//! This crate owns three things: a live registry of broker connections, a
//! routing table mapping topic partitions to leaders, and the background
//! agent that keeps both up to date by periodically asking a broker for
//! cluster metadata. It does not speak the wire protocol itself -- that is
//! supplied by a [`node::NodeFactory`] the caller plugs in -- and it does
//! not batch, retry, or track offsets for produce/consume traffic, which
//! is left to the [`router::ProduceRouter`] and [`router::ConsumeRouter`]
//! collaborators.

mod config;
mod coordinator;
mod error;
mod node;
mod protocol;
mod registry;
mod router;
mod routing;
mod seeds;
mod stats;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
mod topology;

pub use config::{CoordinatorConfig, DEFAULT_MAILBOX_CAPACITY, DEFAULT_METADATA_REFRESH_INTERVAL_MS};
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use error::{Error, RequestError, Result};
pub use node::{CreatedNode, HostPort, Node, NodeEvent, NodeFactory};
pub use protocol::{
    MetadataResponse, MetadataResponseBroker, MetadataResponsePartition, MetadataResponseTopic,
    ProtocolErrorCode,
};
pub use router::{
    ConsumeAck, ConsumeRouter, NoopConsumeRouter, NoopProduceRouter, ProduceAck, ProduceRouter,
};
pub use routing::{Partition, RoutingTable};
pub use stats::{Statistics, StatisticsSnapshot};
