//! Session-state coordinator for partychat rooms.
//!
//! This crate sits between a connection provider and the presentation layer.
//! It owns connection status, room membership, the ordered message log and
//! the typing set, and exposes them as reactive snapshots.

/// Provider-to-coordinator event sink and snapshot stream types.
pub mod channel;
/// Coordinator binding a provider to session state.
pub mod coordinator;
/// Stable session error types.
pub mod error;
/// Typing-presence aggregation.
pub mod presence;
/// Connection provider contract.
pub mod provider;
/// Session state and inbound-event reducer.
pub mod state;
/// Membership and connection state machine, action preconditions.
pub mod state_machine;
/// Ordered message log with history merge.
pub mod timeline;
/// Session data model and boundary types.
pub mod types;
/// JSON socket dialect helpers.
pub mod wire;

pub use channel::{
    ConnectionChannelError, ConnectionEventReceiver, ConnectionEventSink, SnapshotStream,
};
pub use coordinator::SessionCoordinator;
pub use error::{SessionError, SessionErrorCategory};
pub use presence::TypingSet;
pub use provider::{ConnectionHandle, ConnectionProvider};
pub use state::{SessionState, StateChange};
pub use state_machine::{ActionOutcome, SessionStateMachine, SkipReason};
pub use timeline::MessageLog;
pub use types::{
    ChatMessage, ConnectionEvent, ConnectionStatus, InboundEvent, MessageView, OutboundMessage,
    RoomHistory, Session, SessionSnapshot,
};
pub use wire::{RawSocketMessage, classify_inbound, decode_inbound, encode_outbound};
