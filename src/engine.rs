//! Media engine seam.
//!
//! Everything SDP- and ICE-shaped is delegated to an external engine
//! behind [`MediaEngine`]. The orchestrator sequences the calls; it never
//! inspects SDP contents and never generates candidates itself.

use async_trait::async_trait;

use crate::error::CallError;
use crate::types::{IceCandidate, SessionDescription};

/// The negotiation surface of an external WebRTC-style media engine.
///
/// One engine instance serves one call. `release` tears down the peer
/// connection and must be safe to call exactly once per session.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Create the local offer, with or without a video track.
    async fn create_offer(&self, video: bool) -> Result<SessionDescription, CallError>;

    /// Apply the remote offer and produce the local answer.
    async fn create_answer(
        &self,
        remote_offer: SessionDescription,
        video: bool,
    ) -> Result<SessionDescription, CallError>;

    /// Apply the remote answer to an outgoing call.
    async fn apply_remote_description(&self, desc: SessionDescription) -> Result<(), CallError>;

    /// Feed one remote candidate. Only valid after the remote description
    /// has been applied; the orchestrator guarantees the ordering.
    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), CallError>;

    /// Toggle the local audio track.
    async fn set_muted(&self, muted: bool) -> Result<(), CallError>;

    /// Tear down the peer connection and free its media resources.
    async fn release(&self) -> Result<(), CallError>;
}

/// Connection state as reported by the engine's ICE machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl EngineConnectionState {
    /// States that end the call when reported mid-session.
    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

/// Asynchronous notifications out of the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The engine gathered a local candidate to forward to the peer.
    LocalCandidate(IceCandidate),
    /// The ICE connection state changed.
    ConnectionStateChanged(EngineConnectionState),
}
