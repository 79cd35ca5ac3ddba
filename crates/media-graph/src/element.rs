//! Element catalog: the node kinds this graph knows how to host.
//!
//! Elements are constructed by name, the way the factory layer of the media
//! engine resolves them. The catalog records, per kind, the port contract:
//! at most one static sink, at most one static source, and optionally a
//! dynamic pad template on either side for kinds that grow ports on demand
//! (the network input, the mixer, the fan-out tee).

use crate::format::MediaFormat;

/// Network input; one dynamic source port per active remote source.
pub const RTP_INPUT: &str = "rtp-input";
/// Per-peer receive buffer ahead of depacketization.
pub const JITTER_QUEUE: &str = "jitter-queue";
/// RTP depayloader for the session profile.
pub const RTP_DEPAY: &str = "rtp-depay";
/// G.726 audio decoder.
pub const AUDIO_DECODER: &str = "audio-decoder";
/// The shared mixing element; one dynamic sink port per peer.
pub const AUDIO_MIXER: &str = "audio-mixer";
/// Local audio output for monitor mode.
pub const MONITOR_SINK: &str = "monitor-sink";
/// Raw fan-out point; one dynamic source port per return chain.
pub const FAN_OUT: &str = "fan-out";
/// G.726 audio encoder.
pub const AUDIO_ENCODER: &str = "audio-encoder";
/// RTP payloader for the session profile.
pub const RTP_PAY: &str = "rtp-pay";
/// Network output addressed at one peer via `host`/`port` properties.
pub const UDP_OUTPUT: &str = "udp-output";

/// Port contract for one element kind.
#[derive(Debug, Clone, Copy)]
pub struct ElementSpec {
    /// Catalog name.
    pub kind: &'static str,
    /// Format of the static sink port, if the kind has one.
    pub static_sink: Option<MediaFormat>,
    /// Format of the static source port, if the kind has one.
    pub static_src: Option<MediaFormat>,
    /// Dynamic sink pad template, if the kind grows sink ports on demand.
    pub dynamic_sink: Option<MediaFormat>,
    /// Dynamic source pad template, if the kind grows source ports on demand.
    pub dynamic_src: Option<MediaFormat>,
}

const CATALOG: &[ElementSpec] = &[
    ElementSpec {
        kind: RTP_INPUT,
        static_sink: None,
        static_src: None,
        dynamic_sink: None,
        dynamic_src: Some(MediaFormat::Rtp),
    },
    ElementSpec {
        kind: JITTER_QUEUE,
        static_sink: Some(MediaFormat::Rtp),
        static_src: Some(MediaFormat::Rtp),
        dynamic_sink: None,
        dynamic_src: None,
    },
    ElementSpec {
        kind: RTP_DEPAY,
        static_sink: Some(MediaFormat::Rtp),
        static_src: Some(MediaFormat::G726),
        dynamic_sink: None,
        dynamic_src: None,
    },
    ElementSpec {
        kind: AUDIO_DECODER,
        static_sink: Some(MediaFormat::G726),
        static_src: Some(MediaFormat::RawAudio),
        dynamic_sink: None,
        dynamic_src: None,
    },
    ElementSpec {
        kind: AUDIO_MIXER,
        static_sink: None,
        static_src: Some(MediaFormat::RawAudio),
        dynamic_sink: Some(MediaFormat::RawAudio),
        dynamic_src: None,
    },
    ElementSpec {
        kind: MONITOR_SINK,
        static_sink: Some(MediaFormat::RawAudio),
        static_src: None,
        dynamic_sink: None,
        dynamic_src: None,
    },
    ElementSpec {
        kind: FAN_OUT,
        static_sink: Some(MediaFormat::RawAudio),
        static_src: None,
        dynamic_sink: None,
        dynamic_src: Some(MediaFormat::RawAudio),
    },
    ElementSpec {
        kind: AUDIO_ENCODER,
        static_sink: Some(MediaFormat::RawAudio),
        static_src: Some(MediaFormat::G726),
        dynamic_sink: None,
        dynamic_src: None,
    },
    ElementSpec {
        kind: RTP_PAY,
        static_sink: Some(MediaFormat::G726),
        static_src: Some(MediaFormat::Rtp),
        dynamic_sink: None,
        dynamic_src: None,
    },
    ElementSpec {
        kind: UDP_OUTPUT,
        static_sink: Some(MediaFormat::Rtp),
        static_src: None,
        dynamic_sink: None,
        dynamic_src: None,
    },
];

/// Look up the port contract for a kind name.
#[must_use]
pub fn spec_for(kind: &str) -> Option<&'static ElementSpec> {
    CATALOG.iter().find(|spec| spec.kind == kind)
}
