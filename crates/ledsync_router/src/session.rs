//! Participant identity and session tracking.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::{RouterError, RouterResult};

/// Identity of one connected participant, assigned by the router at
/// connection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    /// Generates a fresh identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role a participant announced when it joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// A browser UI.
    WebClient,
    /// A serial gateway, carrying its self-chosen identity.
    LightClient {
        /// Stable gateway name, for logging and diagnostics.
        client_id: String,
    },
}

#[derive(Debug)]
struct Session {
    role: Option<Role>,
    /// Set when the router asks a light client to re-report its hardware;
    /// cleared by the client's next action.
    resync_requested_at: Option<Instant>,
}

/// Tracks every connected participant and its join state.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ParticipantId, Session>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection with no role yet.
    pub fn connect(&mut self, participant: ParticipantId) {
        self.sessions.insert(
            participant,
            Session {
                role: None,
                resync_requested_at: None,
            },
        );
    }

    /// Records the role a participant announced.
    pub fn join(&mut self, participant: ParticipantId, role: Role) -> RouterResult<()> {
        let session = self.session_mut(participant)?;
        session.role = Some(role);
        Ok(())
    }

    /// Returns a participant's role.
    ///
    /// # Errors
    ///
    /// [`RouterError::UnknownParticipant`] for a participant never
    /// connected, [`RouterError::NotJoined`] for one that has not announced
    /// a role.
    pub fn role(&self, participant: ParticipantId) -> RouterResult<&Role> {
        self.sessions
            .get(&participant)
            .ok_or(RouterError::UnknownParticipant { participant })?
            .role
            .as_ref()
            .ok_or(RouterError::NotJoined { participant })
    }

    /// True if the participant is connected, joined or not.
    pub fn is_connected(&self, participant: ParticipantId) -> bool {
        self.sessions.contains_key(&participant)
    }

    /// Marks a light client as owing a hardware re-report.
    pub fn mark_resync_requested(&mut self, participant: ParticipantId) -> RouterResult<()> {
        self.session_mut(participant)?.resync_requested_at = Some(Instant::now());
        Ok(())
    }

    /// Clears a pending resync mark, if any.
    pub fn clear_resync(&mut self, participant: ParticipantId) {
        if let Some(session) = self.sessions.get_mut(&participant) {
            session.resync_requested_at = None;
        }
    }

    /// Participants whose requested resync has been outstanding longer than
    /// `timeout`.
    pub fn stale_resyncs(&self, timeout: Duration) -> Vec<ParticipantId> {
        let now = Instant::now();
        self.sessions
            .iter()
            .filter(|(_, session)| {
                session
                    .resync_requested_at
                    .is_some_and(|requested| now.duration_since(requested) > timeout)
            })
            .map(|(participant, _)| *participant)
            .collect()
    }

    /// Every participant joined as a light client.
    pub fn light_clients(&self) -> Vec<ParticipantId> {
        self.sessions
            .iter()
            .filter(|(_, session)| matches!(session.role, Some(Role::LightClient { .. })))
            .map(|(participant, _)| *participant)
            .collect()
    }

    /// Drops a participant's session.
    pub fn disconnect(&mut self, participant: ParticipantId) {
        self.sessions.remove(&participant);
    }

    fn session_mut(&mut self, participant: ParticipantId) -> RouterResult<&mut Session> {
        self.sessions
            .get_mut(&participant)
            .ok_or(RouterError::UnknownParticipant { participant })
    }
}
