//! Length-prefixed framing and the single-byte acknowledgment.
//!
//! A frame is a 4-byte big-endian length followed by that many bytes of
//! compact UTF-8 JSON holding one [`Envelope`]. A length of zero with no
//! payload is reserved for the termination sentinel.

use crate::envelope::Envelope;
use crate::error::{FormatterError, FormatterResult};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Acknowledgment byte meaning "received, continue".
pub const HANDLED_MESSAGE: u8 = 0x01;

/// Acknowledgment byte meaning "goodbye, peer is terminating".
pub const GOOD_BY_MESSAGE: u8 = 0x00;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message(Envelope),
    Terminate,
}

/// Decoded acknowledgment from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    Continue,
    Goodbye,
    None,
}

impl AckCode {
    /// Whether the session must stop sending after this acknowledgment.
    pub fn terminates(self) -> bool {
        !matches!(self, AckCode::Continue)
    }

    /// The byte a peer writes for this code; `None` has no wire form.
    pub fn byte(self) -> Option<u8> {
        match self {
            AckCode::Continue => Some(HANDLED_MESSAGE),
            AckCode::Goodbye => Some(GOOD_BY_MESSAGE),
            AckCode::None => None,
        }
    }
}

/// Serialize an envelope into a complete frame.
pub fn encode(envelope: &Envelope) -> FormatterResult<Vec<u8>> {
    let payload = serde_json::to_vec(envelope)?;
    let length =
        u32::try_from(payload.len()).map_err(|_| FormatterError::FrameTooLarge(payload.len()))?;

    let mut framed = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    framed.extend_from_slice(&length.to_be_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// The zero-length termination sentinel.
pub fn terminate_frame() -> [u8; LENGTH_PREFIX_LEN] {
    0u32.to_be_bytes()
}

/// Read the payload length out of a 4-byte prefix.
pub fn payload_len(prefix: [u8; LENGTH_PREFIX_LEN]) -> usize {
    u32::from_be_bytes(prefix) as usize
}

/// Decode exactly one complete frame.
pub fn decode(bytes: &[u8]) -> FormatterResult<Frame> {
    if bytes.len() < LENGTH_PREFIX_LEN {
        return Err(FormatterError::unexpected(format!(
            "frame of {} bytes is shorter than the length prefix",
            bytes.len()
        )));
    }

    let (prefix, payload) = bytes.split_at(LENGTH_PREFIX_LEN);
    let mut prefix_buf = [0u8; LENGTH_PREFIX_LEN];
    prefix_buf.copy_from_slice(prefix);
    let expected = payload_len(prefix_buf);
    if payload.len() != expected {
        return Err(FormatterError::unexpected(format!(
            "length prefix announces {expected} bytes but {} follow",
            payload.len()
        )));
    }

    decode_payload(payload)
}

/// Decode a payload whose length prefix has already been consumed.
pub fn decode_payload(payload: &[u8]) -> FormatterResult<Frame> {
    if payload.is_empty() {
        return Ok(Frame::Terminate);
    }
    let envelope = serde_json::from_slice(payload)?;
    Ok(Frame::Message(envelope))
}

/// Map the result of a 1-byte read onto an acknowledgment code.
pub fn decode_ack(byte: Option<u8>) -> AckCode {
    match byte {
        Some(HANDLED_MESSAGE) => AckCode::Continue,
        Some(GOOD_BY_MESSAGE) => AckCode::Goodbye,
        _ => AckCode::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StepStatus;

    fn sample_envelopes() -> Vec<Envelope> {
        vec![
            Envelope::step_finished("step-1", StepStatus::Passed, 1_500_000_000),
            Envelope::step_finished("step-ü", StepStatus::Unknown, 0),
            Envelope::run_finished(true),
        ]
    }

    #[test]
    fn decode_inverts_encode() {
        for envelope in sample_envelopes() {
            let framed = encode(&envelope).unwrap();
            assert_eq!(decode(&framed).unwrap(), Frame::Message(envelope));
        }
    }

    #[test]
    fn prefix_matches_utf8_payload_length() {
        for envelope in sample_envelopes() {
            let framed = encode(&envelope).unwrap();
            let mut prefix = [0u8; LENGTH_PREFIX_LEN];
            prefix.copy_from_slice(&framed[..LENGTH_PREFIX_LEN]);
            let json = serde_json::to_string(&envelope).unwrap();
            assert_eq!(payload_len(prefix), json.len());
            assert_eq!(framed.len(), LENGTH_PREFIX_LEN + json.len());
            assert_ne!(payload_len(prefix), 0, "application frames are never empty");
        }
    }

    #[test]
    fn payload_is_compact_json() {
        let framed = encode(&Envelope::run_finished(true)).unwrap();
        let text = std::str::from_utf8(&framed[LENGTH_PREFIX_LEN..]).unwrap();
        assert!(!text.contains(' '));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn sentinel_decodes_as_terminate() {
        assert_eq!(terminate_frame(), [0, 0, 0, 0]);
        assert_eq!(decode(&terminate_frame()).unwrap(), Frame::Terminate);
    }

    #[test]
    fn decode_rejects_truncated_and_trailing_bytes() {
        let framed = encode(&Envelope::run_finished(true)).unwrap();
        assert!(decode(&framed[..framed.len() - 1]).is_err());
        assert!(decode(&framed[..2]).is_err());

        let mut padded = framed.clone();
        padded.push(b' ');
        assert!(decode(&padded).is_err());
    }

    #[test]
    fn ack_bytes_map_to_codes() {
        assert_eq!(decode_ack(Some(0x01)), AckCode::Continue);
        assert_eq!(decode_ack(Some(0x00)), AckCode::Goodbye);
        assert_eq!(decode_ack(Some(0x02)), AckCode::None);
        assert_eq!(decode_ack(Some(0xff)), AckCode::None);
        assert_eq!(decode_ack(None), AckCode::None);
    }

    #[test]
    fn only_continue_keeps_session_open() {
        assert!(!AckCode::Continue.terminates());
        assert!(AckCode::Goodbye.terminates());
        assert!(AckCode::None.terminates());
        assert_eq!(AckCode::None.byte(), None);
    }
}
