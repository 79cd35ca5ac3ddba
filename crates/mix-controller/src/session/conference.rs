//! `ConferenceActor` - the session controller.
//!
//! One actor owns the processing graph, the endpoint registry, and the mix
//! stage, and consumes transport events one at a time. That single-threaded
//! discipline is what makes the topology mutations safe: no join or leave
//! ever runs concurrently with another, so the registry and the mix-stage
//! state machine need no locking.
//!
//! # Join ordering
//!
//! pause -> build decode chain -> wire network input into it -> ensure mix
//! stage -> wire chain into the mixer (-> build and wire the return chain in
//! mesh mode) -> resume -> register the connection. Registering only after
//! the resume means a leave can never observe a half-attached join.
//!
//! # Leave ordering
//!
//! Mirror image: pause -> detach chains (unlink, stop, remove) -> release
//! dynamic ports -> tear down the mix stage if this was the last peer ->
//! resume -> drop the registry entry.
//!
//! # Mesh-mode address resolution
//!
//! A join is only completed once the peer's remote address is resolvable
//! from transport statistics. Unresolvable handles park in a pending set
//! retried on a timer tick and before every subsequent event. A handle whose
//! address is already owned joins as a redundant path: decoded and mixed,
//! but owning neither the address nor a return chain.

use crate::config::OutputMode;
use crate::errors::MixError;
use crate::pipeline::{decode, output, topology, MixStage};
use crate::session::metrics::ConferenceMetrics;
use crate::session::registry::{Connection, EndpointRegistry, PeerInfo};
use crate::transport::{SourceHandle, SourceStats, TransportEvent};

use chrono::Utc;
use media_graph::{Graph, NodeId, PortDirection};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Command channel depth for the conference mailbox.
const CONFERENCE_CHANNEL_BUFFER: usize = 64;

/// How often parked (address-unresolved) joins are retried.
const PENDING_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Diagnostic commands accepted alongside transport events.
pub enum ConferenceCommand {
    GetPeers {
        respond_to: oneshot::Sender<Vec<PeerInfo>>,
    },
    GetState {
        respond_to: oneshot::Sender<ConferenceState>,
    },
}

/// Point-in-time view of the session, for operators and tests.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConferenceState {
    pub mode: OutputMode,
    pub peers: usize,
    pub pending: usize,
    pub mix_present: bool,
    pub graph_running: bool,
    pub graph_nodes: usize,
}

/// Handle to a running [`ConferenceActor`].
#[derive(Clone)]
pub struct ConferenceActorHandle {
    sender: mpsc::Sender<ConferenceCommand>,
    cancel_token: CancellationToken,
}

impl ConferenceActorHandle {
    /// Enumerate the known peers with their transport-level identities.
    ///
    /// # Errors
    ///
    /// `Internal` when the actor is gone.
    pub async fn get_peers(&self) -> Result<Vec<PeerInfo>, MixError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ConferenceCommand::GetPeers { respond_to: tx })
            .await
            .map_err(|e| MixError::Internal(format!("channel send failed: {e}")))?;
        rx.await
            .map_err(|e| MixError::Internal(format!("response receive failed: {e}")))
    }

    /// Snapshot the session state.
    ///
    /// # Errors
    ///
    /// `Internal` when the actor is gone.
    pub async fn get_state(&self) -> Result<ConferenceState, MixError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ConferenceCommand::GetState { respond_to: tx })
            .await
            .map_err(|e| MixError::Internal(format!("channel send failed: {e}")))?;
        rx.await
            .map_err(|e| MixError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `ConferenceActor` implementation.
pub struct ConferenceActor {
    /// The processing graph; owned, mutated only under pause brackets.
    graph: Graph,
    /// The network-input node whose dynamic ports are the peer slots.
    input_node: NodeId,
    /// Output mode of the shared mix.
    mode: OutputMode,
    /// Handle-keyed connection table.
    registry: EndpointRegistry,
    /// Present/Absent mix bus state machine.
    mix: MixStage,
    /// Handles announced by the transport but not yet address-resolved.
    pending: Vec<SourceHandle>,
    /// Per-source transport statistics (remote addresses).
    stats: SourceStats,
    /// Transport event mailbox.
    events: mpsc::Receiver<TransportEvent>,
    /// Diagnostic command mailbox.
    commands: mpsc::Receiver<ConferenceCommand>,
    /// Cancellation token for graceful shutdown.
    cancel_token: CancellationToken,
    /// Shared gauges and counters.
    metrics: Arc<ConferenceMetrics>,
}

impl ConferenceActor {
    /// Spawn the conference actor.
    ///
    /// `graph` must already contain the network-input node `input_node` and
    /// be running; the actor takes sole ownership of both from here on.
    pub fn spawn(
        graph: Graph,
        input_node: NodeId,
        mode: OutputMode,
        stats: SourceStats,
        events: mpsc::Receiver<TransportEvent>,
        cancel_token: CancellationToken,
        metrics: Arc<ConferenceMetrics>,
    ) -> (ConferenceActorHandle, JoinHandle<Result<(), MixError>>) {
        let (sender, commands) = mpsc::channel(CONFERENCE_CHANNEL_BUFFER);

        let actor = Self {
            graph,
            input_node,
            mode,
            registry: EndpointRegistry::new(),
            mix: MixStage::new(mode),
            pending: Vec::new(),
            stats,
            events,
            commands,
            cancel_token: cancel_token.clone(),
            metrics,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ConferenceActorHandle {
            sender,
            cancel_token,
        };

        (handle, task_handle)
    }

    /// Run the event loop until cancellation, transport closure, or a fatal
    /// error. The error is returned for the supervisor to map to an exit
    /// code - there is no in-process recovery from a corrupted topology.
    #[instrument(skip_all, name = "mx.session", fields(mode = %self.mode))]
    async fn run(mut self) -> Result<(), MixError> {
        info!(target: "mix_controller.session", mode = %self.mode, "ConferenceActor started");

        let mut retry_tick = tokio::time::interval(PENDING_RETRY_INTERVAL);
        retry_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "mix_controller.session", "ConferenceActor cancelled");
                    break Ok(());
                }

                _ = retry_tick.tick() => {
                    if let Err(error) = self.retry_pending().await {
                        break Err(error);
                    }
                }

                event = self.events.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(error) = self.handle_event(event).await {
                                break Err(error);
                            }
                        }
                        None => {
                            info!(target: "mix_controller.session", "transport closed, exiting");
                            break Ok(());
                        }
                    }
                }

                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            info!(target: "mix_controller.session", "command channel closed, exiting");
                            break Ok(());
                        }
                    }
                }
            }
        };

        info!(
            target: "mix_controller.session",
            peers = self.registry.len(),
            pending = self.pending.len(),
            "ConferenceActor stopped"
        );
        result
    }

    async fn handle_event(&mut self, event: TransportEvent) -> Result<(), MixError> {
        // Anything parked may have become resolvable since last tick.
        self.retry_pending().await?;
        match event {
            TransportEvent::SourceAdded(handle) => self.handle_source_added(handle).await,
            TransportEvent::SourceRemoved(handle) => self.handle_source_removed(handle).await,
        }
    }

    async fn handle_command(&mut self, command: ConferenceCommand) {
        match command {
            ConferenceCommand::GetPeers { respond_to } => {
                let peers = self.peer_report().await;
                let _ = respond_to.send(peers);
            }
            ConferenceCommand::GetState { respond_to } => {
                let _ = respond_to.send(self.state_snapshot());
            }
        }
    }

    /// A new source appeared on the transport.
    #[instrument(skip_all, fields(handle = %handle))]
    async fn handle_source_added(&mut self, handle: SourceHandle) -> Result<(), MixError> {
        let address = match self.mode {
            OutputMode::Monitor => None,
            OutputMode::Mesh => match self.stats.remote_address(handle).await {
                Some(address) => Some(address),
                None => {
                    // Defer: never join addressless. Retried on the tick.
                    info!(
                        target: "mix_controller.session",
                        %handle,
                        "peer address not yet resolvable, join deferred"
                    );
                    self.pending.push(handle);
                    self.metrics.record_deferred_join();
                    self.update_gauges();
                    return Ok(());
                }
            },
        };
        self.complete_join(handle, address)
    }

    fn complete_join(
        &mut self,
        handle: SourceHandle,
        address: Option<SocketAddr>,
    ) -> Result<(), MixError> {
        if self.registry.get(handle).is_some() {
            return Err(MixError::DuplicateHandle(handle));
        }

        let redundant = address.is_some_and(|a| self.registry.has_address(a));
        if redundant {
            info!(
                target: "mix_controller.session",
                %handle,
                address = ?address,
                "address already active, joining as redundant path"
            );
        }

        let input_node = self.input_node;
        let mode = self.mode;
        let mix = &mut self.mix;

        let (input_port, decode_chain, output_chain) =
            topology::with_graph_paused(&mut self.graph, |graph| {
                let decode_chain = decode::build_chain(graph)?;
                let input_port = graph.request_port(input_node, PortDirection::Source)?;
                topology::attach_input(graph, input_port, &decode_chain)?;

                mix.ensure_created(graph)?;
                let mix_input = mix.request_mix_input(graph)?;
                topology::attach_output(graph, &decode_chain, mix_input)?;

                let output_chain = match (mode, address, redundant) {
                    (OutputMode::Mesh, Some(peer), false) => {
                        let chain = output::build_chain(graph, peer)?;
                        let fan_src = mix.request_fanout_output(graph)?;
                        topology::attach_input(graph, fan_src, &chain)?;
                        Some(chain)
                    }
                    _ => None,
                };
                Ok((input_port, decode_chain, output_chain))
            })?;

        self.registry.add(Connection {
            handle,
            input_port,
            decode: decode_chain,
            output: output_chain,
            peer_address: if redundant { None } else { address },
            redundant,
            joined_at: Utc::now(),
        })?;

        self.metrics.record_join();
        self.update_gauges();
        info!(
            target: "mix_controller.session",
            %handle,
            peers = self.registry.len(),
            redundant,
            "peer joined"
        );
        self.log_roster();
        Ok(())
    }

    /// A previously announced source disappeared from the transport.
    #[instrument(skip_all, fields(handle = %handle))]
    async fn handle_source_removed(&mut self, handle: SourceHandle) -> Result<(), MixError> {
        if let Some(position) = self.pending.iter().position(|h| *h == handle) {
            self.pending.remove(position);
            self.update_gauges();
            info!(
                target: "mix_controller.session",
                %handle,
                "deferred peer removed before joining"
            );
            return Ok(());
        }

        // The transport only removes handles it previously added, so a miss
        // here means the registry and the graph have diverged.
        let Some(connection) = self.registry.get(handle) else {
            return Err(MixError::HandleNotFound(handle));
        };
        let input_port = connection.input_port;
        let decode_chain = connection.decode.clone();
        let output_chain = connection.output.clone();
        let registry_will_be_empty = self.registry.len() == 1;

        let mix = &mut self.mix;
        topology::with_graph_paused(&mut self.graph, |graph| {
            let mix_input = match decode_chain.output() {
                Some(port) => graph.port_peer(port)?,
                None => None,
            };
            topology::detach(graph, &decode_chain)?;
            if let Some(port) = mix_input {
                graph.release_port(port)?;
            }

            if let Some(chain) = &output_chain {
                let fan_src = match chain.input() {
                    Some(port) => graph.port_peer(port)?,
                    None => None,
                };
                topology::detach(graph, chain)?;
                if let Some(port) = fan_src {
                    graph.release_port(port)?;
                }
            }

            graph.release_port(input_port)?;
            mix.tear_down_if_empty(graph, registry_will_be_empty)?;
            Ok(())
        })?;

        self.registry.remove_by_handle(handle)?;
        self.metrics.record_leave();
        self.update_gauges();
        info!(
            target: "mix_controller.session",
            %handle,
            peers = self.registry.len(),
            "peer left"
        );
        Ok(())
    }

    /// Re-attempt every parked join whose address has become resolvable.
    async fn retry_pending(&mut self) -> Result<(), MixError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let parked = std::mem::take(&mut self.pending);
        for handle in parked {
            debug!(
                target: "mix_controller.session",
                %handle,
                "retrying deferred join"
            );
            // Unresolvable handles park themselves again.
            self.handle_source_added(handle).await?;
        }
        self.update_gauges();
        Ok(())
    }

    async fn peer_report(&self) -> Vec<PeerInfo> {
        let mut peers = Vec::with_capacity(self.registry.len());
        for connection in self.registry.iter() {
            let address = match connection.peer_address {
                Some(owned) => Some(owned),
                // Monitor mode and redundant paths report the live statistic.
                None => self.stats.remote_address(connection.handle).await,
            };
            peers.push(PeerInfo {
                handle: connection.handle,
                address,
                redundant: connection.redundant,
                joined_at: connection.joined_at,
            });
        }
        peers.sort_by_key(|peer| peer.joined_at);
        peers
    }

    fn state_snapshot(&self) -> ConferenceState {
        ConferenceState {
            mode: self.mode,
            peers: self.registry.len(),
            pending: self.pending.len(),
            mix_present: self.mix.is_present(),
            graph_running: self.graph.is_running(),
            graph_nodes: self.graph.node_count(),
        }
    }

    fn update_gauges(&self) {
        self.metrics
            .set_peers(u32::try_from(self.registry.len()).unwrap_or(u32::MAX));
        self.metrics
            .set_pending(u32::try_from(self.pending.len()).unwrap_or(u32::MAX));
        self.metrics.set_mix_active(self.mix.is_present());
    }

    fn log_roster(&self) {
        for connection in self.registry.iter() {
            debug!(
                target: "mix_controller.session",
                handle = %connection.handle,
                address = ?connection.peer_address,
                redundant = connection.redundant,
                "active peer"
            );
        }
    }
}

impl Drop for ConferenceActor {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            warn!(
                target: "mix_controller.session",
                peers = self.registry.len(),
                "actor dropped with live peers; graph state dies with it"
            );
        }
    }
}
