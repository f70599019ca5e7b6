//! Recognized configuration options. The coordinator only consumes the
//! subset it needs; everything else (client_id aside: required_acks,
//! request_timeout_ms, compression_codec, fetch_min_bytes,
//! fetch_max_wait_ms, send/receive_buffer_size, task_scheduler) belongs to
//! the wire layer or the produce/consume routers and is not represented
//! here.

use std::sync::Arc;

/// Default metadata refresh period, matching the original hard-coded
/// ten-minute interval.
pub const DEFAULT_METADATA_REFRESH_INTERVAL_MS: u64 = 10 * 60 * 1000;

/// Default mailbox capacity. Not part of the original design; a bound is
/// required for a real `tokio::sync::mpsc` channel, so this is exposed as
/// an extension rather than hard-coded.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Coordinator-specific configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub seeds: String,
    pub client_id: Arc<str>,
    pub metadata_refresh_interval_ms: u64,
    pub mailbox_capacity: usize,
}

impl CoordinatorConfig {
    pub fn new(seeds: impl Into<String>) -> Self {
        Self {
            seeds: seeds.into(),
            client_id: Arc::from("cluster-coordinator"),
            metadata_refresh_interval_ms: DEFAULT_METADATA_REFRESH_INTERVAL_MS,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}
