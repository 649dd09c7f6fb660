//! JSON socket dialect spoken by room providers.
//!
//! Frames are `{ "type": ..., "data": ... }`. Chat data uses camelCase keys.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    error::{SessionError, SessionErrorCategory},
    types::{ChatMessage, InboundEvent, OutboundMessage, RoomHistory},
};

/// Frame type for chat bodies.
pub const SEND_MESSAGE: &str = "sendMessage";
/// Frame type for typing presence.
pub const SET_TYPING_PRESENCE: &str = "setTypingPresence";

/// Undecoded socket frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawSocketMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl RawSocketMessage {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        serde_json::from_str(text).map_err(|err| serialization_error("invalid_frame", err))
    }

    /// Render as a text frame.
    pub fn to_text(&self) -> Result<String, SessionError> {
        serde_json::to_string(self).map_err(|err| serialization_error("invalid_frame", err))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireChatMessage {
    #[serde(default)]
    body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_icon: Option<String>,
    #[serde(default)]
    timestamp: u64,
    #[serde(default)]
    is_system_message: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    perm_id: Option<String>,
}

impl From<WireChatMessage> for ChatMessage {
    fn from(wire: WireChatMessage) -> Self {
        if wire.is_system_message {
            return ChatMessage::System {
                body: wire.body,
                timestamp_ms: wire.timestamp,
            };
        }
        ChatMessage::User {
            user_nickname: wire.user_nickname.unwrap_or_default(),
            body: wire.body,
            timestamp_ms: wire.timestamp,
            user_icon: wire.user_icon,
            participant_id: wire.perm_id,
        }
    }
}

impl From<&ChatMessage> for WireChatMessage {
    fn from(message: &ChatMessage) -> Self {
        match message {
            ChatMessage::System { body, timestamp_ms } => Self {
                body: body.clone(),
                timestamp: *timestamp_ms,
                is_system_message: true,
                ..Self::default()
            },
            ChatMessage::User {
                user_nickname,
                body,
                timestamp_ms,
                user_icon,
                participant_id,
            } => Self {
                body: body.clone(),
                user_nickname: Some(user_nickname.clone()),
                user_icon: user_icon.clone(),
                timestamp: *timestamp_ms,
                is_system_message: false,
                perm_id: participant_id.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTypingBroadcast {
    users_typing: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTypingUpdate {
    typing: bool,
    room_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireChatSend {
    body: String,
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct WireHistory {
    #[serde(default)]
    messages: Vec<WireChatMessage>,
}

/// Decode an inbound frame, failing on malformed session payloads.
pub fn decode_inbound(raw: &RawSocketMessage) -> Result<InboundEvent, SessionError> {
    match raw.kind.as_str() {
        SEND_MESSAGE => {
            let wire: WireChatMessage = serde_json::from_value(raw.data.clone())
                .map_err(|err| serialization_error("invalid_chat_payload", err))?;
            if wire.body.is_empty() {
                return Err(SessionError::new(
                    SessionErrorCategory::Serialization,
                    "invalid_chat_payload",
                    "chat payload has no body",
                ));
            }
            Ok(InboundEvent::Chat(wire.into()))
        }
        SET_TYPING_PRESENCE => {
            let wire: WireTypingBroadcast = serde_json::from_value(raw.data.clone())
                .map_err(|err| serialization_error("invalid_typing_payload", err))?;
            Ok(InboundEvent::TypingPresence {
                users_typing: wire.users_typing,
            })
        }
        other => Ok(InboundEvent::Other {
            kind: other.to_owned(),
        }),
    }
}

/// Total classification: malformed session payloads degrade to `Other`.
pub fn classify_inbound(raw: &RawSocketMessage) -> InboundEvent {
    decode_inbound(raw).unwrap_or_else(|err| {
        warn!(kind = %raw.kind, error = %err, "dropping malformed inbound payload");
        InboundEvent::Other {
            kind: raw.kind.clone(),
        }
    })
}

/// Encode an inbound event the way a server broadcasts it.
pub fn encode_inbound(event: &InboundEvent) -> RawSocketMessage {
    match event {
        InboundEvent::Chat(message) => {
            RawSocketMessage::new(SEND_MESSAGE, chat_message_value(message))
        }
        InboundEvent::TypingPresence { users_typing } => {
            RawSocketMessage::new(SET_TYPING_PRESENCE, json!({ "usersTyping": users_typing }))
        }
        InboundEvent::Other { kind } => RawSocketMessage::new(kind.clone(), Value::Null),
    }
}

/// Encode an outbound request as `(type, payload)`.
pub fn encode_outbound(message: &OutboundMessage) -> RawSocketMessage {
    match message {
        OutboundMessage::Chat { body } => {
            RawSocketMessage::new(SEND_MESSAGE, json!({ "body": body }))
        }
        OutboundMessage::TypingPresence { typing, room_id } => RawSocketMessage::new(
            SET_TYPING_PRESENCE,
            json!({ "typing": typing, "roomId": room_id }),
        ),
    }
}

/// Server-side decoding of an outbound request.
pub fn decode_outbound(raw: &RawSocketMessage) -> Result<OutboundMessage, SessionError> {
    match raw.kind.as_str() {
        SEND_MESSAGE => {
            let wire: WireChatSend = serde_json::from_value(raw.data.clone())
                .map_err(|err| serialization_error("invalid_chat_payload", err))?;
            Ok(OutboundMessage::Chat { body: wire.body })
        }
        SET_TYPING_PRESENCE => {
            let wire: WireTypingUpdate = serde_json::from_value(raw.data.clone())
                .map_err(|err| serialization_error("invalid_typing_payload", err))?;
            Ok(OutboundMessage::TypingPresence {
                typing: wire.typing,
                room_id: wire.room_id,
            })
        }
        other => Err(SessionError::new(
            SessionErrorCategory::Rejected,
            "unsupported_message_type",
            format!("unsupported outbound message type: {other}"),
        )),
    }
}

/// Encode a join response `{ messages: [...] }`.
pub fn encode_history(history: &RoomHistory) -> Value {
    let messages: Vec<Value> = history.messages.iter().map(chat_message_value).collect();
    json!({ "messages": messages })
}

/// Decode a join response, preserving provider order.
pub fn decode_history(value: Value) -> Result<RoomHistory, SessionError> {
    let wire: WireHistory = serde_json::from_value(value)
        .map_err(|err| serialization_error("invalid_history_payload", err))?;
    Ok(RoomHistory {
        messages: wire.messages.into_iter().map(ChatMessage::from).collect(),
    })
}

fn chat_message_value(message: &ChatMessage) -> Value {
    serde_json::to_value(WireChatMessage::from(message)).unwrap_or(Value::Null)
}

fn serialization_error(code: &str, err: serde_json::Error) -> SessionError {
    SessionError::new(SessionErrorCategory::Serialization, code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_chat_frame_with_optional_fields() {
        let raw = RawSocketMessage::parse(
            r#"{"type":"sendMessage","data":{"body":"hi","userNickname":"Alice","timestamp":1731000000,"permId":"p1"}}"#,
        )
        .expect("frame should parse");

        match classify_inbound(&raw) {
            InboundEvent::Chat(ChatMessage::User {
                user_nickname,
                body,
                timestamp_ms,
                user_icon,
                participant_id,
            }) => {
                assert_eq!(user_nickname, "Alice");
                assert_eq!(body, "hi");
                assert_eq!(timestamp_ms, 1_731_000_000);
                assert_eq!(user_icon, None);
                assert_eq!(participant_id.as_deref(), Some("p1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn system_flag_maps_to_system_variant() {
        let raw = RawSocketMessage::new(
            SEND_MESSAGE,
            json!({ "body": "Bob joined the room", "timestamp": 5, "isSystemMessage": true }),
        );
        assert_eq!(
            classify_inbound(&raw),
            InboundEvent::Chat(ChatMessage::system("Bob joined the room", 5))
        );
    }

    #[test]
    fn chat_frame_without_body_is_ignored() {
        let raw = RawSocketMessage::new(SEND_MESSAGE, json!({ "userNickname": "Alice" }));
        let err = decode_inbound(&raw).expect_err("empty body should be rejected");
        assert_eq!(err.code, "invalid_chat_payload");
        assert_eq!(
            classify_inbound(&raw),
            InboundEvent::Other {
                kind: SEND_MESSAGE.to_owned()
            }
        );
    }

    #[test]
    fn typing_frame_requires_user_list() {
        let ok = RawSocketMessage::new(SET_TYPING_PRESENCE, json!({ "usersTyping": ["Bob"] }));
        assert_eq!(
            classify_inbound(&ok),
            InboundEvent::TypingPresence {
                users_typing: vec!["Bob".to_owned()]
            }
        );

        let bad = RawSocketMessage::new(SET_TYPING_PRESENCE, json!({ "usersTyping": "Bob" }));
        assert!(matches!(classify_inbound(&bad), InboundEvent::Other { .. }));
    }

    #[test]
    fn unknown_frame_types_pass_through_as_other() {
        let raw = RawSocketMessage::parse(r#"{"type":"setPresence"}"#).expect("frame should parse");
        assert_eq!(
            classify_inbound(&raw),
            InboundEvent::Other {
                kind: "setPresence".to_owned()
            }
        );
    }

    #[test]
    fn rejects_non_json_frames() {
        let err = RawSocketMessage::parse("not json").expect_err("garbage should fail");
        assert_eq!(err.category, SessionErrorCategory::Serialization);
    }

    #[test]
    fn outbound_payload_shapes_match_dialect() {
        let chat = encode_outbound(&OutboundMessage::Chat { body: "hi".into() });
        assert_eq!(chat.kind, SEND_MESSAGE);
        assert_eq!(chat.data, json!({ "body": "hi" }));

        let typing = encode_outbound(&OutboundMessage::TypingPresence {
            typing: true,
            room_id: "R1".into(),
        });
        assert_eq!(typing.kind, SET_TYPING_PRESENCE);
        assert_eq!(typing.data, json!({ "typing": true, "roomId": "R1" }));
    }

    #[test]
    fn server_rejects_unknown_outbound_type() {
        let err = decode_outbound(&RawSocketMessage::new("kick", Value::Null))
            .expect_err("unknown outbound type should fail");
        assert_eq!(err.code, "unsupported_message_type");
    }

    #[test]
    fn history_keeps_provider_order() {
        let history = decode_history(json!({
            "messages": [
                { "body": "Alice created the room", "timestamp": 9, "isSystemMessage": true },
                { "body": "first", "userNickname": "Alice", "timestamp": 3 }
            ]
        }))
        .expect("history should decode");

        assert_eq!(history.messages.len(), 2);
        assert!(history.messages[0].is_system());
        assert_eq!(history.messages[1].body(), "first");
    }
}
