//! Signaling transport seam.
//!
//! The orchestrator never talks to a socket. It hands encoded envelopes to
//! a [`SignalingTransport`] and receives [`TransportEvent`]s through its
//! command channel. The concrete transport (a chat connection, a relay,
//! a test double) lives on the other side of this trait.

use async_trait::async_trait;

use crate::error::CallError;
use crate::types::PeerId;

/// Outbound half of the signaling channel.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Deliver one opaque payload to a peer. The transport may store and
    /// forward; delivery is at-most-once from the orchestrator's view and
    /// failures are not retried here.
    async fn send(&self, to: &PeerId, payload: &str) -> Result<(), CallError>;
}

/// Inbound transport notifications, fed into the orchestrator.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport finished authenticating; signaling may flow.
    Connected { self_id: PeerId },
    /// The transport could not establish its connection.
    ConnectionFailed { reason: String },
    /// One message body arrived from a peer.
    MessageReceived { from: PeerId, payload: String },
    /// An established transport connection dropped.
    Disconnected,
}
