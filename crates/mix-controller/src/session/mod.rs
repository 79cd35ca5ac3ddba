//! Session management: the conference actor, the endpoint registry, and
//! the in-process metrics it reports.

pub mod conference;
pub mod metrics;
pub mod registry;

pub use conference::{ConferenceActor, ConferenceActorHandle, ConferenceState};
pub use metrics::{ConferenceMetrics, MetricsSnapshot};
pub use registry::{Connection, EndpointRegistry, PeerInfo};
