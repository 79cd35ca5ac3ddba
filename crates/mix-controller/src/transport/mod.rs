//! Transport layer: source discovery and per-source statistics.
//!
//! The session core never touches sockets. It consumes
//! [`TransportEvent`]s (one per source appearing or disappearing) and
//! queries [`SourceStats`] for the remote address a source last sent from,
//! which is the statistic host-level deduplication runs on. Leave is never
//! signalled explicitly by peers; the watcher infers it from silence.

mod rtp;
mod udp;

pub use rtp::{parse_header, RtpError, RtpHeader, MIN_HEADER_LEN, SESSION_PAYLOAD_TYPE};
pub use udp::UdpTransport;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Opaque identifier for one remote source's network-input slot.
///
/// Handles are minted by the transport layer (from the RTP SSRC) and only
/// ever referenced, never fabricated, by the session core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceHandle(u32);

impl SourceHandle {
    #[must_use]
    pub const fn new(ssrc: u32) -> Self {
        Self(ssrc)
    }

    /// The underlying RTP synchronization source.
    #[must_use]
    pub const fn ssrc(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Edge-triggered source lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// A handle started sending; signalled exactly once per handle.
    SourceAdded(SourceHandle),
    /// A previously added handle went silent past the timeout.
    SourceRemoved(SourceHandle),
}

/// Per-source transport statistics.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// Address of the last datagram received from this source.
    pub remote_address: SocketAddr,
    /// Datagrams accepted from this source.
    pub packets: u64,
}

/// Shared, queryable per-source statistics.
///
/// Written by the transport watcher, read by the session core. Cloning
/// shares the underlying table.
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    inner: Arc<RwLock<HashMap<SourceHandle, SourceRecord>>>,
}

impl SourceStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted datagram from `handle` at `addr`.
    pub async fn record_packet(&self, handle: SourceHandle, addr: SocketAddr) {
        let mut table = self.inner.write().await;
        let record = table.entry(handle).or_insert(SourceRecord {
            remote_address: addr,
            packets: 0,
        });
        record.remote_address = addr;
        record.packets += 1;
    }

    /// The address `handle` last sent from, if any datagram was accepted.
    pub async fn remote_address(&self, handle: SourceHandle) -> Option<SocketAddr> {
        self.inner
            .read()
            .await
            .get(&handle)
            .map(|record| record.remote_address)
    }

    /// A copy of the full record for `handle`.
    pub async fn record(&self, handle: SourceHandle) -> Option<SourceRecord> {
        self.inner.read().await.get(&handle).cloned()
    }

    /// Forget a source entirely.
    pub async fn remove(&self, handle: SourceHandle) {
        self.inner.write().await.remove(&handle);
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stats_track_latest_address() {
        let stats = SourceStats::new();
        let handle = SourceHandle::new(0xabcd_0001);
        assert_eq!(stats.remote_address(handle).await, None);

        let first: SocketAddr = "10.0.0.1:5004".parse().unwrap();
        let second: SocketAddr = "10.0.0.2:5004".parse().unwrap();
        stats.record_packet(handle, first).await;
        stats.record_packet(handle, second).await;

        assert_eq!(stats.remote_address(handle).await, Some(second));
        assert_eq!(stats.record(handle).await.unwrap().packets, 2);

        stats.remove(handle).await;
        assert!(stats.is_empty().await);
    }

    #[test]
    fn test_handle_displays_as_hex() {
        assert_eq!(SourceHandle::new(0xdead_beef).to_string(), "deadbeef");
        assert_eq!(SourceHandle::new(7).to_string(), "00000007");
    }
}
