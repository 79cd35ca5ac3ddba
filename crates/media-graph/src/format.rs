//! Media formats carried between graph ports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The payload format a port produces or accepts.
///
/// Link negotiation compares the source port's format with the sink port's;
/// a link is accepted only when they match. The set is fixed to the formats
/// of the conference session profile (G.726 over RTP, 8 kHz mono).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaFormat {
    /// RTP packets carrying the session payload.
    Rtp,
    /// G.726 encoded audio bytestream.
    G726,
    /// Raw 16-bit PCM audio, 8 kHz mono.
    RawAudio,
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaFormat::Rtp => "application/x-rtp",
            MediaFormat::G726 => "audio/x-g726",
            MediaFormat::RawAudio => "audio/x-raw",
        };
        f.write_str(name)
    }
}
