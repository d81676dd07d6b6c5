//! Call-related error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("malformed signaling message: {0}")]
    MalformedMessage(String),

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("a call is already active: {0}")]
    AlreadyActive(String),

    #[error("no active call")]
    NoActiveCall,

    #[error("invalid call state transition: {0}")]
    InvalidTransition(#[from] crate::session::InvalidTransition),

    #[error("media engine error: {0}")]
    Engine(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not connected")]
    NotConnected,

    #[error("orchestrator stopped")]
    Stopped,
}
