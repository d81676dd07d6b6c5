//! Session registry: owns every live session and enforces the
//! one-active-call policy.

use std::collections::HashMap;

use crate::error::CallError;
use crate::session::Session;
use crate::types::SessionId;

/// All sessions the orchestrator currently knows about, keyed by id.
///
/// At most one session may be non-terminal at a time; `create` refuses a
/// second one. Terminal sessions are removed eagerly by the orchestrator,
/// so the map rarely holds more than one entry.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new session. Fails if another non-terminal session exists.
    pub fn create(&mut self, session: Session) -> Result<(), CallError> {
        if let Some(active) = self.active() {
            return Err(CallError::AlreadyActive(active.id.to_string()));
        }
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// The non-terminal session, if there is one.
    pub fn active(&self) -> Option<&Session> {
        self.sessions.values().find(|s| !s.phase.is_terminal())
    }

    pub fn active_mut(&mut self) -> Option<&mut Session> {
        self.sessions.values_mut().find(|s| !s.phase.is_terminal())
    }

    pub fn has_active(&self) -> bool {
        self.active().is_some()
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        self.sessions.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CallEndReason;
    use crate::session::CallTransition;
    use crate::types::PeerId;

    fn outgoing(id: &str) -> Session {
        Session::new_outgoing(SessionId::from(id), PeerId::from("bob@example.org"), false)
    }

    #[test]
    fn test_second_active_session_refused() {
        let mut registry = SessionRegistry::new();
        registry.create(outgoing("aaaa")).unwrap();

        let err = registry.create(outgoing("bbbb")).unwrap_err();
        assert!(matches!(err, CallError::AlreadyActive(id) if id == "aaaa"));
    }

    #[test]
    fn test_active_lookup() {
        let mut registry = SessionRegistry::new();
        assert!(!registry.has_active());

        registry.create(outgoing("aaaa")).unwrap();
        assert_eq!(registry.active().map(|s| s.id.to_string()), Some("aaaa".into()));
        assert!(registry.get(&SessionId::from("aaaa")).is_some());
    }

    #[test]
    fn test_terminal_session_frees_the_slot() {
        let mut registry = SessionRegistry::new();
        registry.create(outgoing("aaaa")).unwrap();

        registry
            .active_mut()
            .unwrap()
            .apply_transition(CallTransition::Terminated {
                reason: CallEndReason::Failed,
            })
            .unwrap();

        assert!(!registry.has_active());
        registry.create(outgoing("bbbb")).unwrap();
    }

    #[test]
    fn test_remove() {
        let mut registry = SessionRegistry::new();
        registry.create(outgoing("aaaa")).unwrap();

        let removed = registry.remove(&SessionId::from("aaaa")).unwrap();
        assert_eq!(removed.id, SessionId::from("aaaa"));
        assert!(registry.get(&SessionId::from("aaaa")).is_none());
    }
}
