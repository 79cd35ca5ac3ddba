//! Mix Controller error types.
//!
//! Every failure class carries a distinct process exit code. There is no
//! supervisor and no per-peer recovery: session state is derived entirely
//! from the live transport, so the cheapest correct response to a corrupted
//! topology is to die loudly and start clean.

use crate::config::ConfigError;
use crate::transport::SourceHandle;
use media_graph::GraphError;
use thiserror::Error;

/// Mix Controller error type.
///
/// Exit-code mapping (see [`MixError::exit_code`]):
/// - `Config`: 1
/// - `ElementCreation`: 2
/// - `Link`: 3
/// - `HandleNotFound` / `InvariantViolation`: 4 (logic errors, not
///   environmental - the registry and the graph disagreed)
/// - `DuplicateHandle`: 5 (defensive; the transport guarantees uniqueness)
/// - `Transport`: 6
/// - `Internal`: 7
#[derive(Debug, Error)]
pub enum MixError {
    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An internal stage of a subgraph could not be constructed.
    #[error("element creation failed: {0}")]
    ElementCreation(String),

    /// A port pairing was rejected during attach.
    #[error("link negotiation failed: {0}")]
    Link(String),

    /// A leave was signalled for a handle the registry does not know.
    #[error("no connection for handle {0}")]
    HandleNotFound(SourceHandle),

    /// A join was signalled for a handle already in the registry.
    #[error("duplicate handle {0}")]
    DuplicateHandle(SourceHandle),

    /// Registry and graph state diverged from expectation.
    #[error("session state diverged: {0}")]
    InvariantViolation(String),

    /// The transport layer failed (bind, socket, channel).
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal error (channel plumbing, task join).
    #[error("internal error: {0}")]
    Internal(String),
}

impl MixError {
    /// The process exit code for this failure class.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            MixError::Config(_) => 1,
            MixError::ElementCreation(_) => 2,
            MixError::Link(_) => 3,
            MixError::HandleNotFound(_) | MixError::InvariantViolation(_) => 4,
            MixError::DuplicateHandle(_) => 5,
            MixError::Transport(_) => 6,
            MixError::Internal(_) => 7,
        }
    }
}

/// Classify engine errors into the session taxonomy.
///
/// Creation failures only arise from node construction, link failures from
/// port pairing; everything else means the caller drove the engine outside
/// its contract, which is a logic error.
impl From<GraphError> for MixError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::UnknownKind(_) => MixError::ElementCreation(err.to_string()),
            GraphError::FormatMismatch { .. }
            | GraphError::InvalidLink { .. }
            | GraphError::PortBusy(_)
            | GraphError::NotLinked { .. } => MixError::Link(err.to_string()),
            GraphError::MutationWhileRunning
            | GraphError::NodeNotFound(_)
            | GraphError::PortNotFound(_)
            | GraphError::NoStaticPort { .. }
            | GraphError::NoPadTemplate { .. }
            | GraphError::StaticPortRelease(_)
            | GraphError::NodeActive(_)
            | GraphError::NodeLinked(_) => MixError::InvariantViolation(err.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use media_graph::MediaFormat;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(
            MixError::Config(ConfigError::InvalidValue("x".to_string())).exit_code(),
            1
        );
        assert_eq!(
            MixError::ElementCreation("no such kind".to_string()).exit_code(),
            2
        );
        assert_eq!(MixError::Link("format mismatch".to_string()).exit_code(), 3);
        assert_eq!(
            MixError::HandleNotFound(SourceHandle::new(0xdead_beef)).exit_code(),
            4
        );
        assert_eq!(
            MixError::InvariantViolation("diverged".to_string()).exit_code(),
            4
        );
        assert_eq!(
            MixError::DuplicateHandle(SourceHandle::new(1)).exit_code(),
            5
        );
        assert_eq!(MixError::Transport("bind failed".to_string()).exit_code(), 6);
        assert_eq!(MixError::Internal("oneshot dropped".to_string()).exit_code(), 7);
    }

    #[test]
    fn test_graph_error_classification() {
        let creation: MixError = GraphError::UnknownKind("video-scaler".to_string()).into();
        assert!(matches!(creation, MixError::ElementCreation(_)));

        let link: MixError = GraphError::FormatMismatch {
            src: MediaFormat::Rtp,
            sink: MediaFormat::RawAudio,
        }
        .into();
        assert!(matches!(link, MixError::Link(_)));

        let logic: MixError = GraphError::MutationWhileRunning.into();
        assert!(matches!(logic, MixError::InvariantViolation(_)));
        assert_eq!(logic.exit_code(), 4);
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", MixError::HandleNotFound(SourceHandle::new(0x0102_0304))),
            "no connection for handle 01020304"
        );
        assert_eq!(
            format!("{}", MixError::Link("rejected".to_string())),
            "link negotiation failed: rejected"
        );
    }
}
