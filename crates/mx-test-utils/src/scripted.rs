//! Scripted transport: drives the conference actor the way the UDP source
//! watcher would, but from test code.

use mix_controller::transport::{SourceHandle, SourceStats, TransportEvent};
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Event channel depth; matches nothing in particular, just deep enough
/// that a test script never blocks.
const SCRIPT_CHANNEL_BUFFER: usize = 64;

/// A hand-driven stand-in for the UDP source watcher.
///
/// Owns the sending half of the event channel and a handle onto the shared
/// statistics table; the receiving half and a clone of the table go to the
/// actor under test.
pub struct ScriptedTransport {
    events: mpsc::Sender<TransportEvent>,
    stats: SourceStats,
}

impl ScriptedTransport {
    /// Create the scripted transport plus the pieces the actor needs.
    #[must_use]
    pub fn new() -> (Self, SourceStats, mpsc::Receiver<TransportEvent>) {
        let (events, events_rx) = mpsc::channel(SCRIPT_CHANNEL_BUFFER);
        let stats = SourceStats::new();
        (
            Self {
                events,
                stats: stats.clone(),
            },
            stats,
            events_rx,
        )
    }

    /// Announce a source whose address is not yet resolvable.
    pub async fn join(&self, handle: SourceHandle) {
        self.events
            .send(TransportEvent::SourceAdded(handle))
            .await
            .expect("actor should be listening");
    }

    /// Announce a source with a resolvable remote address.
    pub async fn join_from(&self, handle: SourceHandle, addr: SocketAddr) {
        self.stats.record_packet(handle, addr).await;
        self.join(handle).await;
    }

    /// Make a previously announced source's address resolvable, the way
    /// later datagrams populate the statistics.
    pub async fn resolve_address(&self, handle: SourceHandle, addr: SocketAddr) {
        self.stats.record_packet(handle, addr).await;
    }

    /// Time the source out of the transport.
    pub async fn leave(&self, handle: SourceHandle) {
        self.stats.remove(handle).await;
        self.events
            .send(TransportEvent::SourceRemoved(handle))
            .await
            .expect("actor should be listening");
    }
}
