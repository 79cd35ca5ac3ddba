//! UDP source watcher.
//!
//! One socket, many senders: datagrams are validated against the session
//! profile and demultiplexed by SSRC. The first accepted datagram from an
//! unknown SSRC announces a new source; a source that stays silent past the
//! timeout is removed. Peers never signal leave - silence is the signal.

use super::rtp;
use super::{SourceHandle, SourceStats, TransportEvent};
use bytes::BytesMut;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

/// Event channel depth between the watcher and the session core.
const TRANSPORT_CHANNEL_BUFFER: usize = 256;

/// Receive buffer size; comfortably above the session profile's MTU.
const RECV_BUFFER_LEN: usize = 2048;

/// How often silent sources are swept.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// A bound UDP/RTP transport with its watcher task running.
pub struct UdpTransport {
    local_addr: SocketAddr,
    stats: SourceStats,
    events: mpsc::Receiver<TransportEvent>,
    task: JoinHandle<()>,
}

impl UdpTransport {
    /// Bind the listen socket and spawn the watcher task.
    ///
    /// # Errors
    ///
    /// Returns the socket error when the bind fails.
    pub async fn bind(
        bind_addr: SocketAddr,
        source_timeout: Duration,
        cancel_token: CancellationToken,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        let local_addr = socket.local_addr()?;
        let stats = SourceStats::new();
        let (event_tx, event_rx) = mpsc::channel(TRANSPORT_CHANNEL_BUFFER);

        let watcher = Watcher {
            socket,
            stats: stats.clone(),
            events: event_tx,
            sources: HashMap::new(),
            source_timeout,
            cancel_token,
            dropped: 0,
        };
        let task = tokio::spawn(watcher.run());

        Ok(Self {
            local_addr,
            stats,
            events: event_rx,
            task,
        })
    }

    /// The address the socket actually bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle onto the shared per-source statistics.
    #[must_use]
    pub fn stats(&self) -> SourceStats {
        self.stats.clone()
    }

    /// Split into the pieces the session core and the supervisor need.
    #[must_use]
    pub fn split(
        self,
    ) -> (
        SourceStats,
        mpsc::Receiver<TransportEvent>,
        JoinHandle<()>,
    ) {
        (self.stats, self.events, self.task)
    }
}

struct Watcher {
    socket: UdpSocket,
    stats: SourceStats,
    events: mpsc::Sender<TransportEvent>,
    sources: HashMap<SourceHandle, Instant>,
    source_timeout: Duration,
    cancel_token: CancellationToken,
    dropped: u64,
}

impl Watcher {
    async fn run(mut self) {
        info!(
            target: "mix_controller.transport",
            addr = ?self.socket.local_addr().ok(),
            timeout_ms = self.source_timeout.as_millis(),
            "transport watcher started"
        );

        let mut sweep = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut buf = BytesMut::with_capacity(RECV_BUFFER_LEN);

        loop {
            buf.clear();
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "mix_controller.transport", "transport watcher cancelled");
                    break;
                }
                _ = sweep.tick() => {
                    if !self.sweep_silent_sources().await {
                        break;
                    }
                }
                received = self.socket.recv_buf_from(&mut buf) => {
                    match received {
                        Ok((_, from)) => {
                            if !self.accept_datagram(&buf, from).await {
                                break;
                            }
                        }
                        Err(error) => {
                            warn!(
                                target: "mix_controller.transport",
                                %error,
                                "socket receive failed"
                            );
                        }
                    }
                }
            }
        }

        info!(
            target: "mix_controller.transport",
            sources = self.sources.len(),
            dropped = self.dropped,
            "transport watcher stopped"
        );
    }

    /// Returns false when the session core is gone and the watcher should stop.
    async fn accept_datagram(&mut self, datagram: &[u8], from: SocketAddr) -> bool {
        let header = match rtp::parse_header(datagram) {
            Ok(header) => header,
            Err(error) => {
                self.dropped += 1;
                trace!(
                    target: "mix_controller.transport",
                    %from,
                    %error,
                    "datagram dropped"
                );
                return true;
            }
        };

        let handle = SourceHandle::new(header.ssrc);
        let is_new = !self.sources.contains_key(&handle);
        self.sources.insert(handle, Instant::now());
        self.stats.record_packet(handle, from).await;

        if is_new {
            info!(
                target: "mix_controller.transport",
                %handle,
                %from,
                "new source"
            );
            if self
                .events
                .send(TransportEvent::SourceAdded(handle))
                .await
                .is_err()
            {
                return false;
            }
        }
        true
    }

    /// Returns false when the session core is gone and the watcher should stop.
    async fn sweep_silent_sources(&mut self) -> bool {
        let now = Instant::now();
        let timeout = self.source_timeout;
        let expired: Vec<SourceHandle> = self
            .sources
            .iter()
            .filter(|(_, last_seen)| now.duration_since(**last_seen) >= timeout)
            .map(|(handle, _)| *handle)
            .collect();

        for handle in expired {
            self.sources.remove(&handle);
            self.stats.remove(handle).await;
            info!(
                target: "mix_controller.transport",
                %handle,
                "source timed out"
            );
            if self
                .events
                .send(TransportEvent::SourceRemoved(handle))
                .await
                .is_err()
            {
                return false;
            }
        }
        true
    }
}
