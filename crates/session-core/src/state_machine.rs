use tracing::debug;

use crate::types::{ConnectionStatus, Session};

/// Why an action was skipped without contacting the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No live connection binding (never bound or already shut down).
    NotBound,
    /// Nickname is empty after trimming.
    EmptyNickname,
    /// Message body is empty after trimming.
    EmptyBody,
    /// No create/join has succeeded yet.
    NotJoined,
}

/// Result of a coordinator action that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The request was dispatched and, where applicable, applied to state.
    Applied,
    /// A precondition did not hold; nothing was dispatched.
    Skipped(SkipReason),
    /// The provider answered after teardown or rebind; the result was dropped.
    Discarded,
}

/// Connection status and room membership.
///
/// Membership only moves `unjoined -> joined`. Connection status toggles
/// independently of membership.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    status: ConnectionStatus,
    session: Session,
}

impl SessionStateMachine {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            session: Session {
                nickname: nickname.into(),
                ..Session::default()
            },
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn nickname(&self) -> &str {
        &self.session.nickname
    }

    pub fn room_id(&self) -> Option<&str> {
        self.session.room_id.as_deref()
    }

    pub fn is_joined(&self) -> bool {
        self.session.joined
    }

    pub fn on_ready(&mut self) {
        self.status = ConnectionStatus::Connected;
    }

    pub fn on_closed(&mut self) {
        self.status = ConnectionStatus::Disconnected;
    }

    /// Swap the nickname captured by a new binding.
    pub fn rebind_nickname(&mut self, nickname: impl Into<String>) {
        self.session.nickname = nickname.into();
        self.status = ConnectionStatus::Disconnected;
    }

    /// Mark the session joined after a successful create or join.
    pub fn on_room_entered(&mut self, room_id: String) {
        if let Some(previous) = self.session.room_id.as_deref()
            && previous != room_id
        {
            debug!(%previous, %room_id, "session moved to another room");
        }
        self.session.room_id = Some(room_id);
        self.session.joined = true;
    }

    /// Preconditions for create/join.
    pub fn check_enter(&self, bound: bool, nickname: &str) -> Result<(), SkipReason> {
        if !bound {
            return Err(SkipReason::NotBound);
        }
        if nickname.trim().is_empty() {
            return Err(SkipReason::EmptyNickname);
        }
        Ok(())
    }

    /// Preconditions for a chat send.
    pub fn check_send(&self, bound: bool, body: &str) -> Result<(), SkipReason> {
        if !bound {
            return Err(SkipReason::NotBound);
        }
        if !self.session.joined {
            return Err(SkipReason::NotJoined);
        }
        if body.trim().is_empty() {
            return Err(SkipReason::EmptyBody);
        }
        Ok(())
    }

    /// Preconditions for a presence update; returns the target room.
    pub fn check_typing(&self, bound: bool) -> Result<&str, SkipReason> {
        if !bound {
            return Err(SkipReason::NotBound);
        }
        match self.session.room_id.as_deref() {
            Some(room_id) if self.session.joined => Ok(room_id),
            _ => Err(SkipReason::NotJoined),
        }
    }
}
