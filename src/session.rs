//! Call session state machine.

use chrono::{DateTime, Utc};

use crate::events::CallEndReason;
use crate::queue::CandidateQueue;
use crate::types::{PeerId, SessionDescription, SessionId};

/// Which side of the call we are. Fixed at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    Caller,
    Callee,
}

/// Current phase of a call session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallPhase {
    /// Outgoing call: waiting for the engine to produce the local offer.
    Offering,
    /// Incoming call: ringing locally, waiting for accept or reject.
    Ringing { received_at: DateTime<Utc> },
    /// Offer sent (caller) or accept confirmed (callee); media negotiating.
    Connecting,
    /// Media flowing.
    Connected { connected_at: DateTime<Utc> },
    /// Local hang-up in progress: terminate being sent, engine released.
    Ending,
    /// Terminal. No further transitions, late events are dropped.
    Ended {
        reason: CallEndReason,
        ended_at: DateTime<Utc>,
        duration_secs: Option<i64>,
    },
}

impl CallPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended { .. })
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn can_accept(&self) -> bool {
        matches!(self, Self::Ringing { .. })
    }

    pub fn can_reject(&self) -> bool {
        matches!(self, Self::Ringing { .. })
    }
}

/// State transitions for call sessions.
#[derive(Debug, Clone)]
pub enum CallTransition {
    /// The local offer was handed to the transport.
    OfferSent,
    /// The local user accepted a ringing call.
    LocalAccepted,
    /// The media engine reported the connection as established.
    MediaConnected,
    /// A local hang-up began.
    HangupStarted,
    /// The session ended, for whatever reason.
    Terminated { reason: CallEndReason },
}

/// A single call attempt, caller or callee side.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub peer: PeerId,
    pub role: CallRole,
    pub phase: CallPhase,
    /// True once the engine has applied the peer's offer/answer. Gates
    /// candidate delivery: nothing reaches the engine before this flips.
    pub has_remote_description: bool,
    /// Candidates received before `has_remote_description` became true.
    pub pending_candidates: CandidateQueue,
    /// The inbound offer held while ringing (callee only), applied on accept.
    pub remote_offer: Option<SessionDescription>,
    pub video: bool,
    pub muted: bool,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new_outgoing(id: SessionId, peer: PeerId, video: bool) -> Self {
        Self {
            id,
            peer,
            role: CallRole::Caller,
            phase: CallPhase::Offering,
            has_remote_description: false,
            pending_candidates: CandidateQueue::new(),
            remote_offer: None,
            video,
            muted: false,
            created_at: Utc::now(),
        }
    }

    pub fn new_incoming(id: SessionId, peer: PeerId, offer: SessionDescription, video: bool) -> Self {
        Self {
            id,
            peer,
            role: CallRole::Callee,
            phase: CallPhase::Ringing {
                received_at: Utc::now(),
            },
            has_remote_description: false,
            pending_candidates: CandidateQueue::new(),
            remote_offer: Some(offer),
            video,
            muted: false,
            created_at: Utc::now(),
        }
    }

    /// Seconds since the media connection was established, if it is.
    ///
    /// Call duration is derived on demand; the orchestrator owns no timer.
    pub fn elapsed_secs(&self) -> Option<i64> {
        match &self.phase {
            CallPhase::Connected { connected_at } => {
                Some(Utc::now().signed_duration_since(*connected_at).num_seconds())
            }
            _ => None,
        }
    }

    /// Apply a state transition. Returns an error if the transition is
    /// invalid in the current phase.
    pub fn apply_transition(&mut self, transition: CallTransition) -> Result<(), InvalidTransition> {
        let new_phase = match (&self.phase, transition) {
            (CallPhase::Offering, CallTransition::OfferSent) => CallPhase::Connecting,
            (CallPhase::Ringing { .. }, CallTransition::LocalAccepted) => CallPhase::Connecting,
            (CallPhase::Connecting, CallTransition::MediaConnected) => CallPhase::Connected {
                connected_at: Utc::now(),
            },
            (
                CallPhase::Offering
                | CallPhase::Ringing { .. }
                | CallPhase::Connecting
                | CallPhase::Connected { .. },
                CallTransition::HangupStarted,
            ) => CallPhase::Ending,
            (CallPhase::Connected { connected_at }, CallTransition::Terminated { reason }) => {
                let duration = Utc::now().signed_duration_since(*connected_at).num_seconds();
                CallPhase::Ended {
                    reason,
                    ended_at: Utc::now(),
                    duration_secs: Some(duration),
                }
            }
            (
                CallPhase::Offering
                | CallPhase::Ringing { .. }
                | CallPhase::Connecting
                | CallPhase::Ending,
                CallTransition::Terminated { reason },
            ) => CallPhase::Ended {
                reason,
                ended_at: Utc::now(),
                duration_secs: None,
            },
            (current, transition) => {
                return Err(InvalidTransition {
                    current_phase: format!("{:?}", current),
                    attempted: format!("{:?}", transition),
                });
            }
        };
        self.phase = new_phase;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct InvalidTransition {
    pub current_phase: String,
    pub attempted: String,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} in phase {}",
            self.attempted, self.current_phase
        )
    }
}

impl std::error::Error for InvalidTransition {}
