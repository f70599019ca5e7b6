//! The broker registry: three coordinated mappings over the live broker
//! set. Mutated exclusively by the coordinator agent, the only task ever
//! holding a mutable reference to it.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::IteratorRandom;

use crate::node::{HostPort, Node};

/// Metadata the registry keeps about one broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMeta {
    pub id: Option<i32>,
    pub host: String,
    pub port: u16,
}

impl BrokerMeta {
    fn host_port(&self) -> HostPort {
        HostPort::new(self.host.clone(), self.port)
    }
}

/// Opaque identity for an entry in the primary map, distinct from both the
/// broker id and the host:port pair.
pub type Slot = u64;

struct Entry {
    meta: BrokerMeta,
    node: Arc<dyn Node>,
}

/// Three coordinated indices over the live broker set.
///
/// Invariants (checked by the `tests` module and exercised by
/// `tests/coordinator.rs`):
/// - every primary entry's `(host, port)` resolves to the same node via
///   `by_host_port`;
/// - every primary entry with a known `id` resolves to the same node via
///   `by_id`;
/// - neither index contains a key absent from the primary map;
/// - no two entries share `(host, port)` or `id`.
#[derive(Default)]
pub struct BrokerRegistry {
    next_slot: Slot,
    primary: HashMap<Slot, Entry>,
    by_id: HashMap<i32, Slot>,
    by_host_port: HashMap<HostPort, Slot>,
}

impl BrokerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    /// Inserts a brand-new broker (no existing entry for its `(host,
    /// port)`). Returns the assigned slot.
    pub fn insert(&mut self, meta: BrokerMeta, node: Arc<dyn Node>) -> Slot {
        let host_port = meta.host_port();
        let id = meta.id;

        let slot = self.next_slot;
        self.next_slot += 1;

        self.by_host_port.insert(host_port, slot);
        if let Some(id) = id {
            self.by_id.insert(id, slot);
        }
        self.primary.insert(slot, Entry { meta, node });

        slot
    }

    pub fn slot_by_host_port(&self, host_port: &HostPort) -> Option<Slot> {
        self.by_host_port.get(host_port).copied()
    }

    pub fn node_by_id(&self, id: i32) -> Option<Arc<dyn Node>> {
        let slot = self.by_id.get(&id)?;
        self.primary.get(slot).map(|e| Arc::clone(&e.node))
    }

    pub fn meta(&self, slot: Slot) -> Option<&BrokerMeta> {
        self.primary.get(&slot).map(|e| &e.meta)
    }

    /// Records that the broker at `slot` was learned to have id `id`,
    /// pointing the id index at it.
    pub fn set_id(&mut self, slot: Slot, id: i32) {
        if let Some(entry) = self.primary.get_mut(&slot) {
            entry.meta.id = Some(id);
            self.by_id.insert(id, slot);
        }
    }

    /// Drops every id-index entry whose id is not in `keep`.
    pub fn retain_ids(&mut self, keep: impl Fn(&i32) -> bool) {
        self.by_id.retain(|id, _| keep(id));
    }

    /// Removes every primary/host-port entry whose `(host, port)` is not
    /// in `keep`, returning the dropped node handles so the caller can
    /// stop them explicitly rather than leaving them to their own
    /// finalization.
    pub fn retain_host_ports(&mut self, keep: impl Fn(&HostPort) -> bool) -> Vec<Arc<dyn Node>> {
        let dropped_slots: Vec<Slot> = self
            .by_host_port
            .iter()
            .filter(|(hp, _)| !keep(hp))
            .map(|(_, slot)| *slot)
            .collect();

        let mut dropped = Vec::with_capacity(dropped_slots.len());
        for slot in dropped_slots {
            if let Some(entry) = self.primary.remove(&slot) {
                self.by_host_port.remove(&entry.meta.host_port());
                if let Some(id) = entry.meta.id {
                    // only remove if still pointing at this slot: a later
                    // broker may already have claimed the id.
                    if self.by_id.get(&id) == Some(&slot) {
                        self.by_id.remove(&id);
                    }
                }
                dropped.push(entry.node);
            }
        }

        dropped
    }

    /// Removes a single broker by its `(host, port)` identity, used when a
    /// node reports itself dead. Returns the node handle if one was present.
    pub fn remove_by_host_port(&mut self, host_port: &HostPort) -> Option<Arc<dyn Node>> {
        let slot = self.by_host_port.remove(host_port)?;
        let entry = self.primary.remove(&slot)?;
        if let Some(id) = entry.meta.id {
            if self.by_id.get(&id) == Some(&slot) {
                self.by_id.remove(&id);
            }
        }
        Some(entry.node)
    }

    /// Uniform-random selection over the primary map, used to pick the
    /// broker a metadata request is sent to.
    pub fn pick_random(&self) -> Option<Arc<dyn Node>> {
        let mut rng = rand::thread_rng();
        self.primary
            .values()
            .choose(&mut rng)
            .map(|e| Arc::clone(&e.node))
    }

    pub fn brokers(&self) -> impl Iterator<Item = &BrokerMeta> {
        self.primary.values().map(|e| &e.meta)
    }

    /// Empties the registry entirely, returning every node handle it held,
    /// for the agent to stop on shutdown.
    pub fn drain_nodes(&mut self) -> Vec<Arc<dyn Node>> {
        self.by_id.clear();
        self.by_host_port.clear();
        self.primary.drain().map(|(_, entry)| entry.node).collect()
    }

    #[cfg(test)]
    pub fn host_ports(&self) -> std::collections::HashSet<HostPort> {
        self.by_host_port.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use crate::protocol::MetadataResponse;
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

    fn meta(host: &str, port: u16, id: Option<i32>) -> BrokerMeta {
        BrokerMeta {
            id,
            host: host.to_string(),
            port,
        }
    }

    #[test]
    fn three_index_invariant_holds_after_insert_and_remove() {
        let mut registry = BrokerRegistry::new();
        let n1: Arc<dyn Node> = Arc::new(StubNode("n1"));
        let n2: Arc<dyn Node> = Arc::new(StubNode("n2"));

        let s1 = registry.insert(meta("h1", 9092, Some(1)), n1);
        let s2 = registry.insert(meta("h2", 9092, None), n2);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.slot_by_host_port(&HostPort::new("h1", 9092)), Some(s1));
        assert_eq!(registry.slot_by_host_port(&HostPort::new("h2", 9092)), Some(s2));
        assert!(registry.node_by_id(1).is_some());
        assert!(registry.node_by_id(2).is_none());

        let dropped = registry.remove_by_host_port(&HostPort::new("h1", 9092));
        assert!(dropped.is_some());
        assert!(registry.node_by_id(1).is_none());
        assert!(registry.slot_by_host_port(&HostPort::new("h1", 9092)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn retain_host_ports_drops_unadvertised_and_keeps_the_rest() {
        let mut registry = BrokerRegistry::new();
        registry.insert(meta("h1", 9092, Some(1)), Arc::new(StubNode("n1")));
        registry.insert(meta("h2", 9092, Some(2)), Arc::new(StubNode("n2")));

        let advertised = HostPort::new("h1", 9092);
        let dropped = registry.retain_host_ports(|hp| *hp == advertised);

        assert_eq!(dropped.len(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.slot_by_host_port(&HostPort::new("h1", 9092)).is_some());
        assert!(registry.slot_by_host_port(&HostPort::new("h2", 9092)).is_none());
        assert!(registry.node_by_id(2).is_none());
    }

    #[test]
    fn retain_ids_only_touches_the_id_index() {
        let mut registry = BrokerRegistry::new();
        registry.insert(meta("h1", 9092, Some(1)), Arc::new(StubNode("n1")));

        registry.retain_ids(|id| *id != 1);

        assert!(registry.node_by_id(1).is_none());
        // host-port index and primary map are untouched.
        assert_eq!(registry.len(), 1);
        assert!(registry.slot_by_host_port(&HostPort::new("h1", 9092)).is_some());
    }
}
