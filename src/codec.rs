//! Wire codec for signaling envelopes.
//!
//! Serializes the four call-control message kinds to the JSON envelope
//! carried in the body of a transport message. The codec operates on one
//! already-delimited message; framing belongs to the transport.
//!
//! # Envelope shapes
//!
//! ```json
//! {"kind":"offer","sid":"9f2d1c4a0b3e5d67","sdp":"v=0...","video":false}
//! {"kind":"answer","sid":"9f2d1c4a0b3e5d67","sdp":"v=0..."}
//! {"kind":"candidate","sid":"9f2d1c4a0b3e5d67","candidate":"candidate:1 ...","sdpMid":"0","sdpMLineIndex":0}
//! {"kind":"terminate","sid":"9f2d1c4a0b3e5d67"}
//! ```

use crate::error::CallError;
use crate::types::{IceCandidate, SessionId};
use serde::{Deserialize, Serialize};

/// One signaling message exchanged between the two peers of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// Proposes a new call: session description plus the wants-video flag.
    Offer {
        sid: SessionId,
        sdp: String,
        video: bool,
    },
    /// Accepts a proposed call with the answering session description.
    Answer { sid: SessionId, sdp: String },
    /// One ICE candidate, exchanged incrementally in either direction.
    Candidate {
        sid: SessionId,
        candidate: String,
        #[serde(rename = "sdpMid")]
        sdp_mid: String,
        #[serde(rename = "sdpMLineIndex")]
        sdp_mline_index: u16,
    },
    /// Ends the call unconditionally. Also used to reject a ringing call.
    Terminate { sid: SessionId },
}

impl SignalingMessage {
    pub fn candidate(sid: SessionId, candidate: IceCandidate) -> Self {
        Self::Candidate {
            sid,
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
        }
    }

    /// The session this message belongs to.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Offer { sid, .. }
            | Self::Answer { sid, .. }
            | Self::Candidate { sid, .. }
            | Self::Terminate { sid } => sid,
        }
    }

    /// Wire name of the message kind, for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::Terminate { .. } => "terminate",
        }
    }

    /// Encode to the JSON envelope sent as a transport message body.
    pub fn encode(&self) -> Result<String, CallError> {
        serde_json::to_string(self).map_err(|e| CallError::MalformedMessage(e.to_string()))
    }

    /// Decode one transport message body.
    ///
    /// Fails with [`CallError::MalformedMessage`] when the envelope cannot
    /// be parsed or a required field is absent.
    pub fn decode(payload: &str) -> Result<Self, CallError> {
        serde_json::from_str(payload).map_err(|e| CallError::MalformedMessage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> SessionId {
        SessionId::from("ac90cfd09df712d9")
    }

    #[test]
    fn test_offer_roundtrip() {
        let msg = SignalingMessage::Offer {
            sid: sid(),
            sdp: "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n".to_string(),
            video: true,
        };
        let decoded = SignalingMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_answer_roundtrip() {
        let msg = SignalingMessage::Answer {
            sid: sid(),
            sdp: "v=0\r\n".to_string(),
        };
        let decoded = SignalingMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_candidate_roundtrip() {
        let msg = SignalingMessage::candidate(
            sid(),
            IceCandidate::new("candidate:1 1 UDP 2130706431 192.168.1.1 8888 typ host", "0", 0),
        );
        let decoded = SignalingMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_terminate_roundtrip() {
        let msg = SignalingMessage::Terminate { sid: sid() };
        let decoded = SignalingMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_candidate_wire_field_names() {
        let payload = SignalingMessage::candidate(sid(), IceCandidate::new("candidate:1", "audio", 3))
            .encode()
            .unwrap();
        assert!(payload.contains("\"sdpMid\":\"audio\""));
        assert!(payload.contains("\"sdpMLineIndex\":3"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(SignalingMessage::decode("not json at all").is_err());
        assert!(SignalingMessage::decode("{}").is_err());
        assert!(SignalingMessage::decode("[1,2,3]").is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let err = SignalingMessage::decode(r#"{"kind":"ring","sid":"abc"}"#).unwrap_err();
        assert!(matches!(err, CallError::MalformedMessage(_)));
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        // offer without sdp
        let err = SignalingMessage::decode(r#"{"kind":"offer","sid":"abc","video":false}"#).unwrap_err();
        assert!(matches!(err, CallError::MalformedMessage(_)));
        // candidate without sdpMLineIndex
        let err = SignalingMessage::decode(
            r#"{"kind":"candidate","sid":"abc","candidate":"c","sdpMid":"0"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CallError::MalformedMessage(_)));
    }

    #[test]
    fn test_session_id_accessor() {
        let msg = SignalingMessage::Terminate { sid: sid() };
        assert_eq!(msg.session_id(), &sid());
        assert_eq!(msg.kind(), "terminate");
    }
}
