//! Call signaling over a store-and-forward messaging transport.
//!
//! This crate glues two things it does not implement itself: a messaging
//! transport that can deliver opaque payloads between peers, and an
//! external media engine that owns SDP negotiation and ICE. In between
//! sits a single-task orchestrator that tracks call sessions, serializes
//! every state transition, buffers early ICE candidates and translates
//! between user intents, wire envelopes and engine callbacks.
//!
//! Architecture:
//!
//! - [`orchestrator`]: the actor loop, its command channel and [`CallHandle`].
//! - [`session`]: the per-call state machine.
//! - [`registry`]: session ownership and the one-active-call policy.
//! - [`codec`]: the JSON envelope wire format.
//! - [`queue`]: the pre-remote-description candidate buffer.
//! - [`transport`] / [`engine`]: the traits the embedding application implements.
//! - [`events`]: what the orchestrator reports back to the application.

pub mod codec;
pub mod engine;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod queue;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

pub use codec::SignalingMessage;
pub use engine::{EngineConnectionState, EngineEvent, MediaEngine};
pub use error::CallError;
pub use events::{CallEndReason, CallEvent};
pub use orchestrator::{CallHandle, CallOrchestrator, OrchestratorConfig};
pub use session::{CallPhase, CallRole, Session};
pub use transport::{SignalingTransport, TransportEvent};
pub use types::{IceCandidate, PeerId, SdpKind, SessionDescription, SessionId};
