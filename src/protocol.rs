//! Minimal data types for the subset of the metadata RPC the coordinator
//! needs. The wire codec that turns these into/from bytes lives in the
//! connection layer; this module only carries the shapes the coordinator
//! reasons about.

/// Broker-or-partition level error code as reported by a metadata response.
///
/// `None` means "no error". The handful of non-`None` codes a real broker
/// can return are out of scope to enumerate exhaustively here (that belongs
/// to the wire protocol crate); the coordinator only needs to know whether a
/// given code is "ok for clients" to act on when building the routing
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolErrorCode(pub Option<i16>);

impl ProtocolErrorCode {
    pub const NONE: ProtocolErrorCode = ProtocolErrorCode(None);

    pub fn new(code: i16) -> Self {
        if code == 0 {
            Self(None)
        } else {
            Self(Some(code))
        }
    }

    /// Whether a topic or partition carrying this code may still be handed
    /// to client code for routing purposes.
    ///
    /// The original implementation only ever treats the zero ("no error")
    /// code as ok for clients; anything else drops the topic or partition
    /// from the routing table until a later refresh clears it.
    pub fn is_ok_for_clients(self) -> bool {
        self.0.is_none()
    }
}

impl std::fmt::Display for ProtocolErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            None => write!(f, "ok"),
            Some(code) => write!(f, "error({code})"),
        }
    }
}

/// Response to a metadata request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponse {
    pub brokers: Vec<MetadataResponseBroker>,
    pub topics: Vec<MetadataResponseTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponseBroker {
    pub node_id: i32,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponseTopic {
    pub name: String,
    pub error: ProtocolErrorCode,
    pub partitions: Vec<MetadataResponsePartition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponsePartition {
    pub partition_index: i32,
    pub leader_id: i32,
    pub error: ProtocolErrorCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_ok_for_clients() {
        assert!(ProtocolErrorCode::new(0).is_ok_for_clients());
        assert!(!ProtocolErrorCode::new(6).is_ok_for_clients());
        assert!(ProtocolErrorCode::NONE.is_ok_for_clients());
    }
}
