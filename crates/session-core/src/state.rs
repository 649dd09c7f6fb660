//! Session state and the inbound-event reducer.

use tracing::{debug, trace};

use crate::{
    presence::TypingSet,
    state_machine::SessionStateMachine,
    timeline::MessageLog,
    types::{
        ChatMessage, ConnectionEvent, ConnectionStatus, InboundEvent, MessageView, RoomHistory,
        Session, SessionSnapshot,
    },
};

const ANONYMOUS_NAME: &str = "Anonymous";

/// What a reducer step changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// Connection status flipped.
    Connection(ConnectionStatus),
    /// One message was appended to the log.
    MessageAppended,
    /// The typing set was rebuilt.
    TypingReplaced,
    /// Event was not interpreted.
    Ignored,
}

impl StateChange {
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Everything the coordinator owns for one mounted session.
#[derive(Debug, Clone)]
pub struct SessionState {
    machine: SessionStateMachine,
    log: MessageLog,
    typing: TypingSet,
    local_participant_id: Option<String>,
    error_text: Option<String>,
}

impl SessionState {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            machine: SessionStateMachine::new(nickname),
            log: MessageLog::new(),
            typing: TypingSet::default(),
            local_participant_id: None,
            error_text: None,
        }
    }

    pub fn machine(&self) -> &SessionStateMachine {
        &self.machine
    }

    pub fn session(&self) -> &Session {
        self.machine.session()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.log.items()
    }

    pub fn typing(&self) -> &TypingSet {
        &self.typing
    }

    pub fn error_text(&self) -> Option<&str> {
        self.error_text.as_deref()
    }

    /// Reset binding-scoped data for a new nickname binding.
    ///
    /// The log and membership survive; the typing set does not, since its
    /// self-exclusion was computed for the old nickname.
    pub fn rebind(&mut self, nickname: impl Into<String>, participant_id: Option<String>) {
        self.machine.rebind_nickname(nickname);
        self.local_participant_id = participant_id;
        self.typing.clear();
    }

    /// Feed one provider event into the state.
    pub fn apply(&mut self, event: ConnectionEvent) -> StateChange {
        match event {
            ConnectionEvent::Ready => {
                self.machine.on_ready();
                StateChange::Connection(ConnectionStatus::Connected)
            }
            ConnectionEvent::Closed => {
                self.machine.on_closed();
                StateChange::Connection(ConnectionStatus::Disconnected)
            }
            ConnectionEvent::Message(InboundEvent::Chat(message)) => {
                trace!(
                    is_system = message.is_system(),
                    body_len = message.body().len(),
                    "appending chat message"
                );
                self.log.append(message);
                StateChange::MessageAppended
            }
            ConnectionEvent::Message(InboundEvent::TypingPresence { users_typing }) => {
                self.typing.replace(&users_typing, self.machine.nickname());
                trace!(typing = self.typing.users().len(), "typing set replaced");
                StateChange::TypingReplaced
            }
            ConnectionEvent::Message(InboundEvent::Other { kind }) => {
                debug!(%kind, "ignoring non-session message");
                StateChange::Ignored
            }
        }
    }

    /// Record a successful room creation.
    pub fn on_room_created(&mut self, room_id: String) {
        self.machine.on_room_entered(room_id);
        self.error_text = None;
    }

    /// Record a successful join: history first, then membership.
    pub fn on_room_joined(&mut self, room_id: String, history: RoomHistory) {
        debug!(
            %room_id,
            history = history.messages.len(),
            live = self.log.len(),
            "merging room history"
        );
        self.log.prepend_history(history.messages);
        self.machine.on_room_entered(room_id);
        self.error_text = None;
    }

    pub fn set_error_text(&mut self, text: impl Into<String>) {
        self.error_text = Some(text.into());
    }

    pub fn clear_error(&mut self) {
        self.error_text = None;
    }

    /// Derived ownership of a log entry.
    ///
    /// Participant ids win when both sides carry one. Otherwise nicknames are
    /// compared, so two participants sharing a nickname both look like "own".
    pub fn is_own(&self, message: &ChatMessage) -> bool {
        let ChatMessage::User {
            user_nickname,
            participant_id,
            ..
        } = message
        else {
            return false;
        };

        if let (Some(local), Some(remote)) = (&self.local_participant_id, participant_id) {
            return local == remote;
        }

        let nickname = self.machine.nickname();
        !nickname.is_empty() && user_nickname == nickname
    }

    /// Current immutable snapshot for rendering.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection_status: self.machine.status(),
            session: self.machine.session().clone(),
            messages: self.log.items().to_vec(),
            message_views: self
                .log
                .items()
                .iter()
                .map(|message| self.message_view(message))
                .collect(),
            typing_users: self.typing.users().to_vec(),
            error_text: self.error_text.clone(),
        }
    }

    fn message_view(&self, message: &ChatMessage) -> MessageView {
        match message {
            ChatMessage::System { body, timestamp_ms } => MessageView {
                display_name: String::new(),
                body: body.clone(),
                timestamp_ms: *timestamp_ms,
                user_icon: None,
                is_system: true,
                is_own: false,
            },
            ChatMessage::User {
                user_nickname,
                body,
                timestamp_ms,
                user_icon,
                ..
            } => {
                let display_name = if user_nickname.trim().is_empty() {
                    ANONYMOUS_NAME.to_owned()
                } else {
                    user_nickname.clone()
                };
                MessageView {
                    display_name,
                    body: body.clone(),
                    timestamp_ms: *timestamp_ms,
                    user_icon: user_icon.clone(),
                    is_system: false,
                    is_own: self.is_own(message),
                }
            }
        }
    }
}
