//! The node factory contract. A [`Node`] is an owned handle to one broker
//! connection; the wire codec and connection pool behind it are supplied
//! by whatever [`NodeFactory`] the caller plugs in.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RequestError;
use crate::protocol::MetadataResponse;
use crate::router::{ConsumeAck, ProduceAck};

/// Identity of a broker for registry purposes: the `(host, port)` pair.
/// Stable across id changes; a node keeps the same `HostPort` for as long
/// as the underlying connection is reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One broker connection.
///
/// Implementations must close their [`NodeEvent`] sender once [`Node::stop`]
/// has run to completion, so that the coordinator's per-node event
/// forwarder task can exit.
#[async_trait]
pub trait Node: Send + Sync + fmt::Debug {
    /// Stable name used for logging.
    fn name(&self) -> &str;

    /// Fetch metadata, optionally scoped to a single topic.
    async fn fetch_metadata(&self, topic: Option<&str>) -> Result<MetadataResponse, RequestError>;

    /// Shut the connection down. Best-effort; failures are logged by the
    /// caller, not propagated.
    async fn stop(&self);
}

/// Events a [`Node`] emits asynchronously.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    Dead,
    ConnectError(String),
    ReadError(String),
    WriteError(String),
    DecodeError(String),
    Connected,
    RequestSent,
    ResponseReceived,
    ProduceAck(ProduceAck),
    FetchAck(ConsumeAck),
    OffsetAck(ConsumeAck),
}

/// What a factory hands back for a freshly created broker connection: the
/// node handle itself, plus the receiving end of its event stream.
pub struct CreatedNode {
    pub node: Arc<dyn Node>,
    pub events: mpsc::Receiver<NodeEvent>,
}

/// Creates [`Node`]s for a given `(host, port)`. Supplied by the caller;
/// the coordinator only ever calls this and observes the result.
#[async_trait]
pub trait NodeFactory: Send + Sync {
    async fn create(&self, host: &str, port: u16) -> Result<CreatedNode, RequestError>;
}
