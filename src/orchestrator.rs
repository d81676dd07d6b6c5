//! The call orchestrator actor.
//!
//! A single task owns all call state and processes one command at a time,
//! so every transition is serialized without locks. User intents, inbound
//! transport traffic and engine notifications all arrive through the same
//! command channel; replies to intents travel back over oneshot channels.
//!
//! The actor is the only place that touches the [`SessionRegistry`], the
//! [`MediaEngine`] and the outbound [`SignalingTransport`].

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, sleep_until};

use crate::codec::SignalingMessage;
use crate::engine::{EngineConnectionState, EngineEvent, MediaEngine};
use crate::error::CallError;
use crate::events::{CallEndReason, CallEvent};
use crate::registry::SessionRegistry;
use crate::session::{CallRole, CallTransition, Session};
use crate::transport::{SignalingTransport, TransportEvent};
use crate::types::{PeerId, SessionId};

/// Tunables for the orchestrator loop.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long an unanswered incoming call rings before it is rejected.
    pub ring_timeout: Duration,
    /// Capacity of the command channel.
    pub command_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Duration::from_secs(45),
            command_buffer: 64,
        }
    }
}

/// A user-initiated call action, with a reply channel.
pub enum CallIntent {
    PlaceCall {
        peer: PeerId,
        video: bool,
        responder: oneshot::Sender<Result<SessionId, CallError>>,
    },
    Accept {
        responder: oneshot::Sender<Result<(), CallError>>,
    },
    Reject {
        responder: oneshot::Sender<Result<(), CallError>>,
    },
    HangUp {
        responder: oneshot::Sender<Result<(), CallError>>,
    },
    SetMuted {
        muted: bool,
        responder: oneshot::Sender<Result<(), CallError>>,
    },
    ActiveCall {
        responder: oneshot::Sender<Option<Session>>,
    },
}

/// Everything the orchestrator task can be asked to process.
pub enum OrchestratorCommand {
    Intent(CallIntent),
    Transport(TransportEvent),
    Engine(EngineEvent),
}

/// Clonable front door to the orchestrator task.
#[derive(Clone)]
pub struct CallHandle {
    command_tx: mpsc::Sender<OrchestratorCommand>,
}

impl CallHandle {
    /// Start an outgoing call to `peer`. Resolves with the new session id
    /// once the offer has been handed to the transport.
    pub async fn place_call(&self, peer: PeerId, video: bool) -> Result<SessionId, CallError> {
        let (tx, rx) = oneshot::channel();
        self.send_intent(CallIntent::PlaceCall {
            peer,
            video,
            responder: tx,
        })
        .await?;
        rx.await.map_err(|_| CallError::Stopped)?
    }

    /// Accept the currently ringing incoming call.
    pub async fn accept(&self) -> Result<(), CallError> {
        let (tx, rx) = oneshot::channel();
        self.send_intent(CallIntent::Accept { responder: tx }).await?;
        rx.await.map_err(|_| CallError::Stopped)?
    }

    /// Reject the currently ringing incoming call.
    pub async fn reject(&self) -> Result<(), CallError> {
        let (tx, rx) = oneshot::channel();
        self.send_intent(CallIntent::Reject { responder: tx }).await?;
        rx.await.map_err(|_| CallError::Stopped)?
    }

    /// Hang up the active call, whatever phase it is in.
    pub async fn hang_up(&self) -> Result<(), CallError> {
        let (tx, rx) = oneshot::channel();
        self.send_intent(CallIntent::HangUp { responder: tx }).await?;
        rx.await.map_err(|_| CallError::Stopped)?
    }

    /// Mute or unmute the local audio track of the active call.
    pub async fn set_muted(&self, muted: bool) -> Result<(), CallError> {
        let (tx, rx) = oneshot::channel();
        self.send_intent(CallIntent::SetMuted {
            muted,
            responder: tx,
        })
        .await?;
        rx.await.map_err(|_| CallError::Stopped)?
    }

    /// Snapshot of the active session, if any.
    pub async fn active_call(&self) -> Result<Option<Session>, CallError> {
        let (tx, rx) = oneshot::channel();
        self.send_intent(CallIntent::ActiveCall { responder: tx })
            .await?;
        rx.await.map_err(|_| CallError::Stopped)
    }

    /// Feed one transport notification into the orchestrator.
    pub async fn transport_event(&self, event: TransportEvent) -> Result<(), CallError> {
        self.command_tx
            .send(OrchestratorCommand::Transport(event))
            .await
            .map_err(|_| CallError::Stopped)
    }

    /// Feed one engine notification into the orchestrator.
    pub async fn engine_event(&self, event: EngineEvent) -> Result<(), CallError> {
        self.command_tx
            .send(OrchestratorCommand::Engine(event))
            .await
            .map_err(|_| CallError::Stopped)
    }

    async fn send_intent(&self, intent: CallIntent) -> Result<(), CallError> {
        self.command_tx
            .send(OrchestratorCommand::Intent(intent))
            .await
            .map_err(|_| CallError::Stopped)
    }
}

/// The actor state. Constructed once, consumed by [`run`](Self::run).
pub struct CallOrchestrator {
    transport: Arc<dyn SignalingTransport>,
    engine: Arc<dyn MediaEngine>,
    config: OrchestratorConfig,
    registry: SessionRegistry,
    command_rx: mpsc::Receiver<OrchestratorCommand>,
    event_tx: mpsc::UnboundedSender<CallEvent>,
    /// Set once the transport reports itself connected.
    transport_ready: bool,
    self_id: Option<PeerId>,
    /// Armed while an incoming call is ringing.
    ring_deadline: Option<(SessionId, Instant)>,
}

impl CallOrchestrator {
    /// Build the actor plus its handle and event stream. The actor does
    /// nothing until [`run`](Self::run) is awaited (usually on a spawned
    /// task).
    pub fn new(
        transport: Arc<dyn SignalingTransport>,
        engine: Arc<dyn MediaEngine>,
        config: OrchestratorConfig,
    ) -> (Self, CallHandle, mpsc::UnboundedReceiver<CallEvent>) {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            transport,
            engine,
            config,
            registry: SessionRegistry::new(),
            command_rx,
            event_tx,
            transport_ready: false,
            self_id: None,
            ring_deadline: None,
        };
        (orchestrator, CallHandle { command_tx }, event_rx)
    }

    /// Main loop. Returns when every [`CallHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("call orchestrator started");
        loop {
            let ring_at = self
                .ring_deadline
                .as_ref()
                .map(|(_, at)| *at)
                .unwrap_or_else(Instant::now);
            tokio::select! {
                command = self.command_rx.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        OrchestratorCommand::Intent(intent) => self.handle_intent(intent).await,
                        OrchestratorCommand::Transport(event) => self.handle_transport_event(event).await,
                        OrchestratorCommand::Engine(event) => self.handle_engine_event(event).await,
                    }
                }
                _ = sleep_until(ring_at), if self.ring_deadline.is_some() => {
                    self.handle_ring_timeout().await;
                }
            }
        }
        info!("call orchestrator stopped");
    }

    async fn handle_intent(&mut self, intent: CallIntent) {
        match intent {
            CallIntent::PlaceCall {
                peer,
                video,
                responder,
            } => {
                let result = self.place_call(peer, video).await;
                let _ = responder.send(result);
            }
            CallIntent::Accept { responder } => {
                let _ = responder.send(self.accept_call().await);
            }
            CallIntent::Reject { responder } => {
                let _ = responder.send(self.reject_call().await);
            }
            CallIntent::HangUp { responder } => {
                let _ = responder.send(self.hang_up_call().await);
            }
            CallIntent::SetMuted { muted, responder } => {
                let _ = responder.send(self.set_muted(muted).await);
            }
            CallIntent::ActiveCall { responder } => {
                let _ = responder.send(self.registry.active().cloned());
            }
        }
    }

    async fn place_call(&mut self, peer: PeerId, video: bool) -> Result<SessionId, CallError> {
        if !self.transport_ready {
            return Err(CallError::NotConnected);
        }
        let id = SessionId::generate();
        self.registry
            .create(Session::new_outgoing(id.clone(), peer.clone(), video))?;
        info!("placing {} call {} to {}", if video { "video" } else { "audio" }, id, peer);

        let offer = match self.engine.create_offer(video).await {
            Ok(offer) => offer,
            Err(e) => {
                warn!("offer creation failed for call {}: {}", id, e);
                self.finish_session(&id, CallEndReason::Failed).await;
                return Err(e);
            }
        };
        self.emit(CallEvent::LocalOfferReady {
            session_id: id.clone(),
        });

        let envelope = SignalingMessage::Offer {
            sid: id.clone(),
            sdp: offer.sdp,
            video,
        };
        self.send_message(&peer, &envelope).await;

        if let Some(session) = self.registry.get_mut(&id) {
            session.apply_transition(CallTransition::OfferSent)?;
        }
        self.emit(CallEvent::CallRinging {
            session_id: id.clone(),
        });
        Ok(id)
    }

    async fn accept_call(&mut self) -> Result<(), CallError> {
        let (id, peer, offer, video) = {
            let session = self.registry.active_mut().ok_or(CallError::NoActiveCall)?;
            if !session.phase.can_accept() {
                return Err(CallError::InvalidTransition(
                    crate::session::InvalidTransition {
                        current_phase: format!("{:?}", session.phase),
                        attempted: "LocalAccepted".to_string(),
                    },
                ));
            }
            let offer = session
                .remote_offer
                .take()
                .ok_or_else(|| CallError::Engine("ringing session has no stored offer".into()))?;
            (session.id.clone(), session.peer.clone(), offer, session.video)
        };
        info!("accepting call {} from {}", id, peer);

        let answer = match self.engine.create_answer(offer, video).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("answer creation failed for call {}: {}", id, e);
                self.finish_session(&id, CallEndReason::Failed).await;
                return Err(e);
            }
        };
        // The engine has the remote offer applied now; flush whatever
        // candidates arrived while we were ringing.
        self.flush_pending(&id).await;

        let envelope = SignalingMessage::Answer {
            sid: id.clone(),
            sdp: answer.sdp,
        };
        self.send_message(&peer, &envelope).await;

        if let Some(session) = self.registry.get_mut(&id) {
            session.apply_transition(CallTransition::LocalAccepted)?;
        }
        self.clear_ring_deadline(&id);
        self.emit(CallEvent::CallConnecting { session_id: id });
        Ok(())
    }

    async fn reject_call(&mut self) -> Result<(), CallError> {
        let (id, peer) = {
            let session = self.registry.active().ok_or(CallError::NoActiveCall)?;
            if !session.phase.can_reject() {
                return Err(CallError::InvalidTransition(
                    crate::session::InvalidTransition {
                        current_phase: format!("{:?}", session.phase),
                        attempted: "Terminated(Rejected)".to_string(),
                    },
                ));
            }
            (session.id.clone(), session.peer.clone())
        };
        info!("rejecting call {} from {}", id, peer);

        self.send_message(&peer, &SignalingMessage::Terminate { sid: id.clone() })
            .await;
        self.finish_session(&id, CallEndReason::Rejected).await;
        Ok(())
    }

    async fn hang_up_call(&mut self) -> Result<(), CallError> {
        let (id, peer) = {
            let session = self.registry.active_mut().ok_or(CallError::NoActiveCall)?;
            session.apply_transition(CallTransition::HangupStarted)?;
            (session.id.clone(), session.peer.clone())
        };
        info!("hanging up call {}", id);

        self.send_message(&peer, &SignalingMessage::Terminate { sid: id.clone() })
            .await;
        self.finish_session(&id, CallEndReason::LocalHangup).await;
        Ok(())
    }

    async fn set_muted(&mut self, muted: bool) -> Result<(), CallError> {
        let id = {
            let session = self.registry.active().ok_or(CallError::NoActiveCall)?;
            session.id.clone()
        };
        self.engine.set_muted(muted).await?;
        if let Some(session) = self.registry.get_mut(&id) {
            session.muted = muted;
        }
        debug!("call {} muted={}", id, muted);
        Ok(())
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { self_id } => {
                info!("signaling transport connected as {}", self_id);
                self.transport_ready = true;
                self.self_id = Some(self_id);
            }
            TransportEvent::ConnectionFailed { reason } => {
                warn!("signaling transport connection failed: {}", reason);
                self.transport_ready = false;
                self.end_active_call(CallEndReason::TransportLost).await;
            }
            TransportEvent::Disconnected => {
                warn!("signaling transport disconnected");
                self.transport_ready = false;
                self.end_active_call(CallEndReason::TransportLost).await;
            }
            TransportEvent::MessageReceived { from, payload } => {
                match SignalingMessage::decode(&payload) {
                    Ok(message) => self.handle_signaling(from, message).await,
                    Err(e) => warn!("dropping undecodable message from {}: {}", from, e),
                }
            }
        }
    }

    async fn handle_signaling(&mut self, from: PeerId, message: SignalingMessage) {
        debug!("{} message for session {} from {}", message.kind(), message.session_id(), from);
        match message {
            SignalingMessage::Offer { sid, sdp, video } => {
                self.handle_remote_offer(from, sid, sdp, video).await;
            }
            SignalingMessage::Answer { sid, sdp } => {
                self.handle_remote_answer(from, sid, sdp).await;
            }
            SignalingMessage::Candidate {
                sid,
                candidate,
                sdp_mid,
                sdp_mline_index,
            } => {
                let candidate = crate::types::IceCandidate::new(candidate, sdp_mid, sdp_mline_index);
                self.handle_remote_candidate(sid, candidate).await;
            }
            SignalingMessage::Terminate { sid } => {
                self.handle_remote_terminate(from, sid).await;
            }
        }
    }

    async fn handle_remote_offer(&mut self, from: PeerId, sid: SessionId, sdp: String, video: bool) {
        if self.registry.has_active() {
            // Already in a call. The offer stays unanswered; the remote
            // side gives up on its own ring timeout.
            warn!("ignoring offer {} from {} while another call is active", sid, from);
            return;
        }
        if self.registry.get(&sid).is_some() {
            debug!("ignoring duplicate offer for session {}", sid);
            return;
        }
        let session = Session::new_incoming(
            sid.clone(),
            from.clone(),
            crate::types::SessionDescription::offer(sdp),
            video,
        );
        if let Err(e) = self.registry.create(session) {
            warn!("could not register incoming call {}: {}", sid, e);
            return;
        }
        self.ring_deadline = Some((sid.clone(), Instant::now() + self.config.ring_timeout));
        info!("incoming {} call {} from {}", if video { "video" } else { "audio" }, sid, from);
        self.emit(CallEvent::IncomingCall {
            peer: from,
            session_id: sid,
            has_video: video,
        });
    }

    async fn handle_remote_answer(&mut self, from: PeerId, sid: SessionId, sdp: String) {
        let Some(session) = self.registry.get(&sid) else {
            debug!("dropping answer: {}", CallError::UnknownSession(sid.to_string()));
            return;
        };
        let ok = session.role == CallRole::Caller
            && session.peer == from
            && !session.phase.is_terminal()
            // An answer is applied at most once.
            && !session.has_remote_description;
        if !ok {
            debug!("dropping answer for mismatched session {}", sid);
            return;
        }
        let answer = crate::types::SessionDescription::answer(sdp);
        if let Err(e) = self.engine.apply_remote_description(answer).await {
            warn!("applying remote answer failed for call {}: {}", sid, e);
            self.finish_session(&sid, CallEndReason::Failed).await;
            return;
        }
        self.flush_pending(&sid).await;
    }

    async fn handle_remote_candidate(&mut self, sid: SessionId, candidate: crate::types::IceCandidate) {
        let Some(session) = self.registry.get_mut(&sid) else {
            debug!("dropping candidate: {}", CallError::UnknownSession(sid.to_string()));
            return;
        };
        if session.phase.is_terminal() {
            debug!("dropping candidate for ended session {}", sid);
            return;
        }
        if !session.has_remote_description {
            session.pending_candidates.enqueue(candidate);
            debug!(
                "buffered candidate for session {} ({} pending)",
                sid,
                session.pending_candidates.len()
            );
            return;
        }
        // Individual candidate failures are not fatal; the engine keeps
        // trying the paths it already has.
        if let Err(e) = self.engine.add_remote_candidate(candidate).await {
            warn!("adding candidate failed for call {}: {}", sid, e);
        }
    }

    async fn handle_remote_terminate(&mut self, from: PeerId, sid: SessionId) {
        let reason = match self.registry.get(&sid) {
            Some(session) if !session.phase.is_terminal() => {
                if session.phase.can_accept() {
                    CallEndReason::Rejected
                } else {
                    CallEndReason::RemoteHangup
                }
            }
            _ => {
                debug!(
                    "dropping terminate from {}: {}",
                    from,
                    CallError::UnknownSession(sid.to_string())
                );
                return;
            }
        };
        info!("call {} terminated by {}", sid, from);
        self.finish_session(&sid, reason).await;
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::LocalCandidate(candidate) => {
                let Some(session) = self.registry.active() else {
                    debug!("dropping local candidate with no active call");
                    return;
                };
                let (sid, peer) = (session.id.clone(), session.peer.clone());
                let envelope = SignalingMessage::candidate(sid, candidate);
                self.send_message(&peer, &envelope).await;
            }
            EngineEvent::ConnectionStateChanged(state) => {
                self.handle_engine_state(state).await;
            }
        }
    }

    async fn handle_engine_state(&mut self, state: EngineConnectionState) {
        debug!("engine connection state: {:?}", state);
        let Some(session) = self.registry.active_mut() else {
            return;
        };
        let id = session.id.clone();
        match state {
            EngineConnectionState::Connected => {
                if session.phase.is_connected() {
                    return;
                }
                match session.apply_transition(CallTransition::MediaConnected) {
                    Ok(()) => {
                        info!("call {} connected", id);
                        self.emit(CallEvent::CallConnected { session_id: id });
                    }
                    Err(e) => debug!("ignoring connected report for call {}: {}", id, e),
                }
            }
            s if s.is_broken() => {
                warn!("engine reported {:?} for call {}", s, id);
                self.finish_session(&id, CallEndReason::Failed).await;
            }
            _ => {}
        }
    }

    async fn handle_ring_timeout(&mut self) {
        let Some((sid, _)) = self.ring_deadline.take() else {
            return;
        };
        let still_ringing = self
            .registry
            .get(&sid)
            .map(|s| s.phase.can_accept())
            .unwrap_or(false);
        if !still_ringing {
            return;
        }
        info!("incoming call {} timed out unanswered", sid);
        let peer = match self.registry.get(&sid) {
            Some(session) => session.peer.clone(),
            None => return,
        };
        self.send_message(&peer, &SignalingMessage::Terminate { sid: sid.clone() })
            .await;
        self.finish_session(&sid, CallEndReason::Rejected).await;
    }

    /// Mark the remote description as applied and feed buffered candidates
    /// to the engine in arrival order. Runs at most once per session.
    async fn flush_pending(&mut self, sid: &SessionId) {
        let pending = match self.registry.get_mut(sid) {
            Some(session) => {
                session.has_remote_description = true;
                session.pending_candidates.drain_all()
            }
            None => return,
        };
        if pending.is_empty() {
            return;
        }
        debug!("flushing {} buffered candidates for session {}", pending.len(), sid);
        for candidate in pending {
            if let Err(e) = self.engine.add_remote_candidate(candidate).await {
                warn!("adding buffered candidate failed for call {}: {}", sid, e);
            }
        }
    }

    /// Encode and send one envelope. Send failures are logged and the call
    /// proceeds; the transport owns retry and delivery semantics.
    async fn send_message(&self, to: &PeerId, message: &SignalingMessage) {
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("could not encode {} message: {}", message.kind(), e);
                return;
            }
        };
        if let Err(e) = self.transport.send(to, &payload).await {
            warn!("sending {} to {} failed: {}", message.kind(), to, e);
        }
    }

    /// Terminal teardown: transition, engine release, registry removal,
    /// ring-timer disarm and the final event, in that order.
    async fn finish_session(&mut self, sid: &SessionId, reason: CallEndReason) {
        let Some(session) = self.registry.get_mut(sid) else {
            return;
        };
        if session.phase.is_terminal() {
            return;
        }
        if let Err(e) = session.apply_transition(CallTransition::Terminated { reason }) {
            warn!("could not terminate session {}: {}", sid, e);
        }
        session.pending_candidates.clear();
        self.registry.remove(sid);
        self.clear_ring_deadline(sid);

        if let Err(e) = self.engine.release().await {
            warn!("engine release failed for call {}: {}", sid, e);
        }
        self.emit(CallEvent::CallEnded {
            session_id: sid.clone(),
            reason,
        });
    }

    async fn end_active_call(&mut self, reason: CallEndReason) {
        let id = match self.registry.active() {
            Some(session) => session.id.clone(),
            None => return,
        };
        self.finish_session(&id, reason).await;
    }

    fn clear_ring_deadline(&mut self, sid: &SessionId) {
        if self.ring_deadline.as_ref().is_some_and(|(id, _)| id == sid) {
            self.ring_deadline = None;
        }
    }

    fn emit(&self, event: CallEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("no event subscriber, dropping call event");
        }
    }
}
