//! The shared mix stage.
//!
//! The mix bus exists exactly while the conference has peers: created
//! lazily on the first join after being empty, destroyed synchronously when
//! the registry empties again, never kept warm. Absence is a typed state
//! (`Option`), not a dangling sentinel.

use crate::config::OutputMode;
use crate::errors::MixError;
use media_graph::{element, Graph, NodeId, PortDirection, PortId};
use tracing::info;

/// The live mix bus: the mixing element plus its fixed downstream chain.
#[derive(Debug, Clone, Copy)]
struct MixBus {
    mixer: NodeId,
    /// Monitor mode: the local audio sink. Mesh mode: the fan-out tee.
    downstream: NodeId,
}

/// Present/Absent state machine for the shared mixing resources.
///
/// Both operations are idempotent and are invoked on *every* join/leave
/// transition by the session controller; the existence invariant (present
/// iff the registry is non-empty) is enforced by that call discipline, not
/// by this type alone.
#[derive(Debug)]
pub struct MixStage {
    mode: OutputMode,
    bus: Option<MixBus>,
}

impl MixStage {
    #[must_use]
    pub fn new(mode: OutputMode) -> Self {
        Self { mode, bus: None }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.bus.is_some()
    }

    /// Create the mix bus if it does not exist yet. No-op when present.
    ///
    /// The graph must already be paused.
    ///
    /// # Errors
    ///
    /// `ElementCreation` / `Link` when the bus cannot be built - fatal.
    pub fn ensure_created(&mut self, graph: &mut Graph) -> Result<(), MixError> {
        if self.bus.is_some() {
            return Ok(());
        }

        let mixer = graph.create_node(element::AUDIO_MIXER)?;
        let downstream_kind = match self.mode {
            OutputMode::Monitor => element::MONITOR_SINK,
            OutputMode::Mesh => element::FAN_OUT,
        };
        let downstream = graph.create_node(downstream_kind)?;
        graph.link(
            graph.static_port(mixer, PortDirection::Source)?,
            graph.static_port(downstream, PortDirection::Sink)?,
        )?;

        self.bus = Some(MixBus { mixer, downstream });
        info!(
            target: "mix_controller.pipeline",
            mode = %self.mode,
            "mix stage created"
        );
        Ok(())
    }

    /// Request a dynamic mixer input for one peer's decoded audio.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` when the stage is absent - inputs are only
    /// requested between `ensure_created` and teardown.
    pub fn request_mix_input(&self, graph: &mut Graph) -> Result<PortId, MixError> {
        let bus = self.bus.ok_or_else(|| {
            MixError::InvariantViolation("mix input requested while mix stage absent".to_string())
        })?;
        Ok(graph.request_port(bus.mixer, PortDirection::Sink)?)
    }

    /// Request a dynamic fan-out source feeding one peer's return chain.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` when the stage is absent or the mode has no
    /// fan-out point.
    pub fn request_fanout_output(&self, graph: &mut Graph) -> Result<PortId, MixError> {
        let bus = self.bus.ok_or_else(|| {
            MixError::InvariantViolation(
                "fan-out output requested while mix stage absent".to_string(),
            )
        })?;
        if self.mode != OutputMode::Mesh {
            return Err(MixError::InvariantViolation(
                "fan-out output requested in monitor mode".to_string(),
            ));
        }
        Ok(graph.request_port(bus.downstream, PortDirection::Source)?)
    }

    /// Tear the mix bus down when the last peer has left. No-op when the
    /// registry still has peers or the bus is already gone.
    ///
    /// The graph must already be paused and every peer chain must already
    /// be detached.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` when the bus cannot be unwired cleanly.
    pub fn tear_down_if_empty(
        &mut self,
        graph: &mut Graph,
        registry_is_empty: bool,
    ) -> Result<(), MixError> {
        if !registry_is_empty {
            return Ok(());
        }
        let Some(bus) = self.bus.take() else {
            return Ok(());
        };

        let mix_out = graph.static_port(bus.mixer, PortDirection::Source)?;
        if let Some(peer) = graph.port_peer(mix_out)? {
            graph.unlink(mix_out, peer)?;
        }
        graph.stop_node(bus.downstream)?;
        graph.remove_node(bus.downstream)?;
        graph.stop_node(bus.mixer)?;
        graph.remove_node(bus.mixer)?;

        info!(target: "mix_controller.pipeline", "mix stage torn down");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_created_is_idempotent() {
        let mut graph = Graph::new();
        let mut stage = MixStage::new(OutputMode::Monitor);
        assert!(!stage.is_present());

        stage.ensure_created(&mut graph).unwrap();
        assert!(stage.is_present());
        assert_eq!(graph.node_count(), 2);

        // Called on every join; must not build a second bus.
        stage.ensure_created(&mut graph).unwrap();
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_tear_down_only_when_empty() {
        let mut graph = Graph::new();
        let mut stage = MixStage::new(OutputMode::Monitor);
        stage.ensure_created(&mut graph).unwrap();

        stage.tear_down_if_empty(&mut graph, false).unwrap();
        assert!(stage.is_present());

        stage.tear_down_if_empty(&mut graph, true).unwrap();
        assert!(!stage.is_present());
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_double_tear_down_is_noop() {
        let mut graph = Graph::new();
        let mut stage = MixStage::new(OutputMode::Monitor);
        stage.ensure_created(&mut graph).unwrap();

        stage.tear_down_if_empty(&mut graph, true).unwrap();
        stage.tear_down_if_empty(&mut graph, true).unwrap();
        assert!(!stage.is_present());
    }

    #[test]
    fn test_mix_input_requires_presence() {
        let mut graph = Graph::new();
        let stage = MixStage::new(OutputMode::Monitor);
        let err = stage.request_mix_input(&mut graph).unwrap_err();
        assert!(matches!(err, MixError::InvariantViolation(_)));
    }

    #[test]
    fn test_fanout_output_requires_mesh_mode() {
        let mut graph = Graph::new();
        let mut monitor = MixStage::new(OutputMode::Monitor);
        monitor.ensure_created(&mut graph).unwrap();
        assert!(matches!(
            monitor.request_fanout_output(&mut graph),
            Err(MixError::InvariantViolation(_))
        ));

        let mut graph = Graph::new();
        let mut mesh = MixStage::new(OutputMode::Mesh);
        mesh.ensure_created(&mut graph).unwrap();
        let port = mesh.request_fanout_output(&mut graph).unwrap();
        assert_eq!(graph.port_peer(port).unwrap(), None);
    }

    #[test]
    fn test_tear_down_releases_all_nodes_in_mesh_mode() {
        let mut graph = Graph::new();
        let mut stage = MixStage::new(OutputMode::Mesh);
        stage.ensure_created(&mut graph).unwrap();
        let fan_src = stage.request_fanout_output(&mut graph).unwrap();
        let mix_in = stage.request_mix_input(&mut graph).unwrap();
        graph.release_port(fan_src).unwrap();
        graph.release_port(mix_in).unwrap();

        stage.tear_down_if_empty(&mut graph, true).unwrap();
        assert_eq!(graph.node_count(), 0);
    }
}
