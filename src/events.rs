//! Events the orchestrator emits towards the embedding application.

use crate::types::{PeerId, SessionId};

/// Why a call stopped existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEndReason {
    /// The remote peer sent a terminate for an established call.
    RemoteHangup,
    /// We hung up.
    LocalHangup,
    /// The callee turned the call down while it was ringing, or it rang
    /// out unanswered. On the caller side a peer's terminate always
    /// reads as [`RemoteHangup`](Self::RemoteHangup).
    Rejected,
    /// The media engine reported failure, or an engine operation failed.
    Failed,
    /// The signaling transport dropped while the call was active.
    TransportLost,
}

/// UI-facing call lifecycle events.
///
/// These are the only things that cross from the orchestrator to the
/// presentation layer; everything else is handled internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// An inbound offer created a ringing session. Answer with
    /// [`CallHandle::accept`](crate::orchestrator::CallHandle::accept) or
    /// [`CallHandle::reject`](crate::orchestrator::CallHandle::reject).
    IncomingCall {
        peer: PeerId,
        session_id: SessionId,
        has_video: bool,
    },
    /// The engine produced our local offer; it is about to be sent.
    LocalOfferReady { session_id: SessionId },
    /// The offer was handed to the transport; the remote side is ringing.
    CallRinging { session_id: SessionId },
    /// We accepted an incoming call and sent the answer.
    CallConnecting { session_id: SessionId },
    /// The media engine reported the connection as established.
    CallConnected { session_id: SessionId },
    /// The session reached a terminal phase and was removed.
    CallEnded {
        session_id: SessionId,
        reason: CallEndReason,
    },
}
