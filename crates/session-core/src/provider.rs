//! Connection provider contract consumed by the coordinator.
//!
//! A provider owns the transport. The coordinator binds it to an event sink,
//! issues requests through the returned handle and releases the handle when
//! the session ends or rebinds.

use std::future::Future;

use crate::{
    channel::ConnectionEventSink,
    error::SessionError,
    types::{OutboundMessage, RoomHistory},
};

/// Factory for bound connections.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Handle type returned by [`ConnectionProvider::bind`].
    type Handle: ConnectionHandle;

    /// Open a connection whose lifecycle and inbound messages go to `sink`.
    ///
    /// The provider should emit `Ready` through the sink once usable.
    fn bind(&self, sink: ConnectionEventSink) -> Result<Self::Handle, SessionError>;
}

/// One live connection.
pub trait ConnectionHandle: Send + Sync + 'static {
    /// Request a new room; resolves to its id.
    fn create_room(
        &self,
        nickname: &str,
        icon: Option<&str>,
    ) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Join an existing room; resolves to its history in provider order.
    fn join_room(
        &self,
        nickname: &str,
        room_id: &str,
        icon: Option<&str>,
    ) -> impl Future<Output = Result<RoomHistory, SessionError>> + Send;

    /// Fire-and-forget dispatch.
    fn send(&self, message: OutboundMessage) -> Result<(), SessionError>;

    /// Stable participant id for this connection, if the provider has one.
    fn participant_id(&self) -> Option<String> {
        None
    }

    /// Tear the connection down. Called exactly once per bind.
    fn release(&self);
}
