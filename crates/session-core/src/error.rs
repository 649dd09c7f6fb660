use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error category used for user-facing handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionErrorCategory {
    /// Invalid input such as an unknown room.
    Config,
    /// The provider or server refused the request.
    Rejected,
    /// The connection is closed or was released.
    Network,
    /// A wire payload could not be decoded.
    Serialization,
    /// Internal bug or invariant break.
    Internal,
}

/// Stable error payload surfaced by coordinator actions and providers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct SessionError {
    /// High-level error category.
    pub category: SessionErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl SessionError {
    /// Construct a new session error.
    pub fn new(
        category: SessionErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// The room id is unknown to the provider.
    pub fn room_not_found(room_id: &str) -> Self {
        Self::new(
            SessionErrorCategory::Config,
            "room_not_found",
            format!("room not found: {room_id}"),
        )
    }

    /// The connection handle was already released.
    pub fn connection_released() -> Self {
        Self::new(
            SessionErrorCategory::Network,
            "connection_released",
            "connection handle was released",
        )
    }

    /// The connection is not a member of any room.
    pub fn not_in_room() -> Self {
        Self::new(
            SessionErrorCategory::Rejected,
            "not_in_room",
            "connection has not joined a room",
        )
    }

    /// Text shown in the user-facing error banner.
    pub fn banner_text(&self, action: &str) -> String {
        format!("{action} failed ({}): {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_room_not_found_code_stable() {
        let err = SessionError::room_not_found("R404");
        assert_eq!(err.code, "room_not_found");
        assert_eq!(err.category, SessionErrorCategory::Config);
        assert!(err.message.contains("R404"));
    }

    #[test]
    fn display_includes_category_and_code() {
        let err = SessionError::connection_released();
        assert_eq!(
            err.to_string(),
            "Network:connection_released: connection handle was released"
        );
    }

    #[test]
    fn banner_text_names_action_and_code() {
        let err = SessionError::not_in_room();
        assert_eq!(
            err.banner_text("send"),
            "send failed (not_in_room): connection has not joined a room"
        );
    }
}
