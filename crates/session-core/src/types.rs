use serde::{Deserialize, Serialize};

/// Transport-level connection status reported by the provider lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No ready signal received yet, or the provider reported a close.
    #[default]
    Disconnected,
    /// The provider reported the connection as ready.
    Connected,
}

impl ConnectionStatus {
    /// `true` when the provider last reported ready.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Room membership of the local participant.
///
/// `room_id` and `joined` always change together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Session {
    /// Room identifier once a create/join succeeded.
    pub room_id: Option<String>,
    /// Nickname captured by the current binding.
    pub nickname: String,
    /// Whether a create/join succeeded.
    pub joined: bool,
}

/// One entry of the room message log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChatMessage {
    /// Informational notice not attributable to a sender.
    System {
        /// Notice text.
        body: String,
        /// Milliseconds since Unix epoch.
        timestamp_ms: u64,
    },
    /// Message written by a participant.
    User {
        /// Sender nickname as broadcast by the provider.
        user_nickname: String,
        /// Message text.
        body: String,
        /// Milliseconds since Unix epoch.
        timestamp_ms: u64,
        /// Optional avatar reference (URL or data URL).
        user_icon: Option<String>,
        /// Stable per-connection participant id, when the provider supplies one.
        participant_id: Option<String>,
    },
}

impl ChatMessage {
    /// Build a system notice.
    pub fn system(body: impl Into<String>, timestamp_ms: u64) -> Self {
        Self::System {
            body: body.into(),
            timestamp_ms,
        }
    }

    /// Build a participant message without icon or participant id.
    pub fn user(nickname: impl Into<String>, body: impl Into<String>, timestamp_ms: u64) -> Self {
        Self::User {
            user_nickname: nickname.into(),
            body: body.into(),
            timestamp_ms,
            user_icon: None,
            participant_id: None,
        }
    }

    /// Message text.
    pub fn body(&self) -> &str {
        match self {
            Self::System { body, .. } | Self::User { body, .. } => body,
        }
    }

    /// Timestamp in milliseconds since Unix epoch.
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::System { timestamp_ms, .. } | Self::User { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    /// `true` for system notices.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }
}

/// History returned by a successful room join, in provider order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RoomHistory {
    /// Backlog of prior messages, oldest first.
    pub messages: Vec<ChatMessage>,
}

/// Inbound message delivered by the provider's message callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum InboundEvent {
    /// Chat body broadcast (including echoes of the local participant).
    Chat(ChatMessage),
    /// Full set of participants currently typing in the room.
    TypingPresence {
        /// Nicknames flagged as typing, possibly including the local one.
        users_typing: Vec<String>,
    },
    /// Any message type the coordinator does not interpret.
    Other {
        /// Provider-level message type name.
        kind: String,
    },
}

/// Outbound message dispatched through the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Chat send request. The message is rendered only once echoed back.
    Chat {
        /// Message text.
        body: String,
    },
    /// Typing-presence update scoped to a room.
    TypingPresence {
        /// Whether the local draft is non-empty.
        typing: bool,
        /// Target room.
        room_id: String,
    },
}

/// Lifecycle and message events pushed by a bound provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection became ready.
    Ready,
    /// The connection closed.
    Closed,
    /// An inbound message arrived.
    Message(InboundEvent),
}

/// Render-ready message row derived from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    /// Sender label; `Anonymous` when the nickname is blank, empty for notices.
    pub display_name: String,
    /// Message text.
    pub body: String,
    /// Milliseconds since Unix epoch.
    pub timestamp_ms: u64,
    /// Avatar reference for participant messages.
    pub user_icon: Option<String>,
    /// System notice flag.
    pub is_system: bool,
    /// Derived ownership (right-aligned rendering).
    pub is_own: bool,
}

/// Full state snapshot published after every state change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub connection_status: ConnectionStatus,
    pub session: Session,
    /// Raw log in display order.
    pub messages: Vec<ChatMessage>,
    /// Log rows prepared for rendering.
    pub message_views: Vec<MessageView>,
    /// Remote participants currently typing.
    pub typing_users: Vec<String>,
    /// Last surfaced failure, if any.
    pub error_text: Option<String>,
}

impl SessionSnapshot {
    /// Indicator text shown while anyone else is typing.
    pub fn typing_label(&self) -> Option<&'static str> {
        if self.typing_users.is_empty() {
            None
        } else {
            Some("Someone is typing...")
        }
    }
}
