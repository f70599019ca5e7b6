//! Minimal interfaces for the produce and consume routers. Their
//! batching, retries, and offset tracking are out of scope for this crate;
//! the coordinator only publishes routing-table changes to them and
//! forwards broker acknowledgements.

use std::sync::Arc;

use async_trait::async_trait;

use crate::routing::RoutingTable;

/// Acknowledgement of a produced record, forwarded from a node's
/// `produce_ack` event.
#[derive(Debug, Clone)]
pub struct ProduceAck {
    pub topic: String,
    pub partition: i32,
}

/// Acknowledgement of a fetch or offset response, forwarded from a node's
/// `fetch_ack` / `offset_ack` events.
#[derive(Debug, Clone)]
pub enum ConsumeAck {
    Fetch { topic: String, partition: i32 },
    Offset { topic: String, partition: i32 },
}

#[async_trait]
pub trait ProduceRouter: Send + Sync {
    async fn acknowledge(&self, ack: ProduceAck);

    fn change_routing_table(&self, table: Arc<RoutingTable>);

    async fn stop(&self);
}

#[async_trait]
pub trait ConsumeRouter: Send + Sync {
    async fn acknowledge(&self, ack: ConsumeAck);

    fn change_routing_table(&self, table: Arc<RoutingTable>);

    async fn stop(&self);
}

/// Router that does nothing; used when the caller only needs the
/// coordinator (e.g. an admin-only client, or tests).
#[derive(Debug, Default)]
pub struct NoopProduceRouter;

#[async_trait]
impl ProduceRouter for NoopProduceRouter {
    async fn acknowledge(&self, _ack: ProduceAck) {}

    fn change_routing_table(&self, _table: Arc<RoutingTable>) {}

    async fn stop(&self) {}
}

#[derive(Debug, Default)]
pub struct NoopConsumeRouter;

#[async_trait]
impl ConsumeRouter for NoopConsumeRouter {
    async fn acknowledge(&self, _ack: ConsumeAck) {}

    fn change_routing_table(&self, _table: Arc<RoutingTable>) {}

    async fn stop(&self) {}
}
