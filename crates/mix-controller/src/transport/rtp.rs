//! Minimal RTP header validation.
//!
//! The watcher only needs enough of the header to demultiplex: version,
//! payload type (the session profile is single-payload) and the SSRC.
//! Depacketization belongs to the decode chain, not here.

use thiserror::Error;

/// RTP protocol version accepted by the watcher.
pub const RTP_VERSION: u8 = 2;

/// Fixed RTP header length in bytes (no CSRC entries counted).
pub const MIN_HEADER_LEN: usize = 12;

/// Dynamic payload type of the session profile (G.726, 8 kHz mono).
pub const SESSION_PAYLOAD_TYPE: u8 = 96;

/// Reasons a datagram is dropped at the socket.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtpError {
    /// Shorter than a fixed RTP header.
    #[error("datagram truncated: {0} bytes")]
    Truncated(usize),

    /// Not RTP version 2.
    #[error("unsupported RTP version: {0}")]
    Version(u8),

    /// Payload type outside the session profile.
    #[error("unexpected payload type: {0}")]
    PayloadType(u8),
}

/// The fields the watcher cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub payload_type: u8,
    pub sequence: u16,
    pub ssrc: u32,
}

/// Validate a datagram against the session profile and extract its header.
///
/// # Errors
///
/// Returns [`RtpError`] when the datagram is truncated, carries the wrong
/// version, or a payload type outside the session profile.
pub fn parse_header(datagram: &[u8]) -> Result<RtpHeader, RtpError> {
    if datagram.len() < MIN_HEADER_LEN {
        return Err(RtpError::Truncated(datagram.len()));
    }

    let b0 = datagram.first().copied().unwrap_or_default();
    let version = b0 >> 6;
    if version != RTP_VERSION {
        return Err(RtpError::Version(version));
    }

    let b1 = datagram.get(1).copied().unwrap_or_default();
    let payload_type = b1 & 0x7f;
    if payload_type != SESSION_PAYLOAD_TYPE {
        return Err(RtpError::PayloadType(payload_type));
    }

    let sequence = datagram
        .get(2..4)
        .and_then(|raw| raw.try_into().ok())
        .map(u16::from_be_bytes)
        .ok_or(RtpError::Truncated(datagram.len()))?;

    let ssrc = datagram
        .get(8..12)
        .and_then(|raw| raw.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or(RtpError::Truncated(datagram.len()))?;

    Ok(RtpHeader {
        payload_type,
        sequence,
        ssrc,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn packet(version: u8, payload_type: u8, sequence: u16, ssrc: u32) -> Vec<u8> {
        let mut datagram = vec![0u8; MIN_HEADER_LEN + 4];
        datagram[0] = version << 6;
        datagram[1] = payload_type;
        datagram[2..4].copy_from_slice(&sequence.to_be_bytes());
        datagram[8..12].copy_from_slice(&ssrc.to_be_bytes());
        datagram
    }

    #[test]
    fn test_parse_valid_header() {
        let header =
            parse_header(&packet(RTP_VERSION, SESSION_PAYLOAD_TYPE, 41, 0xfeed_f00d)).unwrap();
        assert_eq!(header.payload_type, SESSION_PAYLOAD_TYPE);
        assert_eq!(header.sequence, 41);
        assert_eq!(header.ssrc, 0xfeed_f00d);
    }

    #[test]
    fn test_truncated_rejected() {
        assert_eq!(parse_header(&[0x80; 5]), Err(RtpError::Truncated(5)));
        assert_eq!(parse_header(&[]), Err(RtpError::Truncated(0)));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let datagram = packet(1, SESSION_PAYLOAD_TYPE, 0, 1);
        assert_eq!(parse_header(&datagram), Err(RtpError::Version(1)));
    }

    #[test]
    fn test_foreign_payload_type_rejected() {
        let datagram = packet(RTP_VERSION, 8, 0, 1);
        assert_eq!(parse_header(&datagram), Err(RtpError::PayloadType(8)));
    }

    #[test]
    fn test_marker_bit_does_not_leak_into_payload_type() {
        let mut datagram = packet(RTP_VERSION, SESSION_PAYLOAD_TYPE, 3, 9);
        datagram[1] |= 0x80; // marker set
        let header = parse_header(&datagram).unwrap();
        assert_eq!(header.payload_type, SESSION_PAYLOAD_TYPE);
    }
}
