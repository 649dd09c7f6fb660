use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::types::{ConnectionEvent, InboundEvent, SessionSnapshot};

/// Snapshot stream handed to the presentation layer.
pub type SnapshotStream = watch::Receiver<SessionSnapshot>;

/// Receiving half drained by the coordinator's event pump.
pub type ConnectionEventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Errors returned by connection channel operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionChannelError {
    /// The binding that owned the receiver was torn down.
    #[error("connection event channel is closed")]
    Closed,
}

/// Callback surface a provider uses to push lifecycle and message events.
///
/// Emission never blocks, so providers may call it from synchronous
/// callbacks.
#[derive(Clone, Debug)]
pub struct ConnectionEventSink {
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionEventSink {
    /// Create a sink together with the receiver the coordinator drains.
    pub fn new() -> (Self, ConnectionEventReceiver) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { event_tx }, event_rx)
    }

    /// Ready callback.
    pub fn ready(&self) -> Result<(), ConnectionChannelError> {
        self.emit(ConnectionEvent::Ready)
    }

    /// Closed callback.
    pub fn closed(&self) -> Result<(), ConnectionChannelError> {
        self.emit(ConnectionEvent::Closed)
    }

    /// Message callback.
    pub fn message(&self, event: InboundEvent) -> Result<(), ConnectionChannelError> {
        self.emit(ConnectionEvent::Message(event))
    }

    /// Push one event to the bound coordinator.
    pub fn emit(&self, event: ConnectionEvent) -> Result<(), ConnectionChannelError> {
        self.event_tx
            .send(event)
            .map_err(|_| ConnectionChannelError::Closed)
    }

    /// `true` once the coordinator side was dropped.
    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_events_in_emission_order() {
        let (sink, mut rx) = ConnectionEventSink::new();
        sink.ready().expect("ready should send");
        sink.message(InboundEvent::Other {
            kind: "ping".into(),
        })
        .expect("message should send");
        sink.closed().expect("closed should send");

        assert_eq!(rx.recv().await, Some(ConnectionEvent::Ready));
        assert_eq!(
            rx.recv().await,
            Some(ConnectionEvent::Message(InboundEvent::Other {
                kind: "ping".into()
            }))
        );
        assert_eq!(rx.recv().await, Some(ConnectionEvent::Closed));
    }

    #[tokio::test]
    async fn reports_closed_after_receiver_drop() {
        let (sink, rx) = ConnectionEventSink::new();
        drop(rx);

        assert!(sink.is_closed());
        assert_eq!(sink.ready(), Err(ConnectionChannelError::Closed));
    }
}
