//! Session coordinator: binds a provider and owns all session state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    channel::{ConnectionEventReceiver, ConnectionEventSink, SnapshotStream},
    error::SessionError,
    provider::{ConnectionHandle, ConnectionProvider},
    state::SessionState,
    state_machine::{ActionOutcome, SkipReason},
    types::{OutboundMessage, SessionSnapshot},
};

struct Binding<H> {
    handle: Arc<H>,
    pump: JoinHandle<()>,
}

struct Inner<H> {
    state: SessionState,
    /// Bumped on every teardown; pending requests and pumps compare against it.
    generation: u64,
    binding: Option<Binding<H>>,
}

impl<H: ConnectionHandle> Inner<H> {
    fn handle(&self) -> Option<Arc<H>> {
        self.binding
            .as_ref()
            .map(|binding| Arc::clone(&binding.handle))
    }

    fn release_binding(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        let Some(binding) = self.binding.take() else {
            return false;
        };
        binding.pump.abort();
        binding.handle.release();
        true
    }
}

struct Shared<H> {
    inner: Mutex<Inner<H>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<H> Shared<H> {
    fn lock(&self) -> MutexGuard<'_, Inner<H>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }
}

/// Owns connection status, membership, message log and typing set for one
/// mounted chat session.
///
/// Must be created inside a Tokio runtime: each binding spawns an event pump
/// that applies provider events to the state.
pub struct SessionCoordinator<P: ConnectionProvider> {
    provider: P,
    shared: Arc<Shared<P::Handle>>,
}

impl<P: ConnectionProvider> SessionCoordinator<P> {
    /// Bind `provider` for `nickname` and start applying its events.
    pub fn initialize(provider: P, nickname: impl Into<String>) -> Result<Self, SessionError> {
        let nickname = nickname.into();
        let state = SessionState::new(nickname.clone());
        let (snapshot_tx, _) = watch::channel(state.snapshot());
        let coordinator = Self {
            provider,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state,
                    generation: 0,
                    binding: None,
                }),
                snapshot_tx,
            }),
        };
        coordinator.establish(nickname)?;
        Ok(coordinator)
    }

    /// Replace the binding for a new nickname.
    ///
    /// The old handle is released and its pump stopped before the provider
    /// is bound again, so no two bindings feed the same state.
    pub fn rebind(&self, nickname: impl Into<String>) -> Result<(), SessionError> {
        self.establish(nickname.into())
    }

    /// Release the connection. Later actions are skipped and pending
    /// create/join results are discarded.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        if inner.release_binding() {
            info!("session coordinator shut down");
        }
    }

    pub fn is_bound(&self) -> bool {
        self.shared.lock().binding.is_some()
    }

    /// Current state for rendering.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshots published after each state change.
    pub fn subscribe(&self) -> SnapshotStream {
        self.shared.snapshot_tx.subscribe()
    }

    /// Dismiss the error banner.
    pub fn clear_error(&self) {
        let mut inner = self.shared.lock();
        inner.state.clear_error();
        self.shared.publish(&inner.state);
    }

    /// Create a room and enter it on success.
    pub async fn create_room(
        &self,
        nickname: &str,
        icon: Option<&str>,
    ) -> Result<ActionOutcome, SessionError> {
        let (handle, generation) = match self.prepare_enter(nickname) {
            Ok(prepared) => prepared,
            Err(reason) => {
                debug!(?reason, "create_room skipped");
                return Ok(ActionOutcome::Skipped(reason));
            }
        };

        let result = handle.create_room(nickname, icon).await;

        let mut inner = self.shared.lock();
        if inner.generation != generation {
            debug!("discarding create_room result from a torn-down binding");
            return Ok(ActionOutcome::Discarded);
        }
        match result {
            Ok(room_id) => {
                info!(%room_id, "room created");
                inner.state.on_room_created(room_id);
                self.shared.publish(&inner.state);
                Ok(ActionOutcome::Applied)
            }
            Err(err) => {
                warn!(error = %err, "failed to create room");
                inner.state.set_error_text(err.banner_text("create room"));
                self.shared.publish(&inner.state);
                Err(err)
            }
        }
    }

    /// Join an existing room, prepending its history to the log.
    pub async fn join_room(
        &self,
        room_id: &str,
        nickname: &str,
        icon: Option<&str>,
    ) -> Result<ActionOutcome, SessionError> {
        let (handle, generation) = match self.prepare_enter(nickname) {
            Ok(prepared) => prepared,
            Err(reason) => {
                debug!(?reason, %room_id, "join_room skipped");
                return Ok(ActionOutcome::Skipped(reason));
            }
        };

        let result = handle.join_room(nickname, room_id, icon).await;

        let mut inner = self.shared.lock();
        if inner.generation != generation {
            debug!(%room_id, "discarding join_room result from a torn-down binding");
            return Ok(ActionOutcome::Discarded);
        }
        match result {
            Ok(history) => {
                info!(%room_id, history = history.messages.len(), "joined room");
                inner.state.on_room_joined(room_id.to_owned(), history);
                self.shared.publish(&inner.state);
                Ok(ActionOutcome::Applied)
            }
            Err(err) => {
                warn!(%room_id, error = %err, "failed to join room");
                inner.state.set_error_text(err.banner_text("join room"));
                self.shared.publish(&inner.state);
                Err(err)
            }
        }
    }

    /// Dispatch a chat message. The log only changes when the echo arrives.
    pub fn send_message(&self, body: &str) -> Result<ActionOutcome, SessionError> {
        let mut inner = self.shared.lock();
        let handle = inner.handle();
        if let Err(reason) = inner.state.machine().check_send(handle.is_some(), body) {
            debug!(?reason, "send_message skipped");
            return Ok(ActionOutcome::Skipped(reason));
        }
        let Some(handle) = handle else {
            return Ok(ActionOutcome::Skipped(SkipReason::NotBound));
        };

        debug!(body_len = body.len(), "dispatching chat message");
        let message = OutboundMessage::Chat {
            body: body.to_owned(),
        };
        if let Err(err) = handle.send(message) {
            warn!(error = %err, "failed to dispatch chat message");
            inner.state.set_error_text(err.banner_text("send message"));
            self.shared.publish(&inner.state);
            return Err(err);
        }
        Ok(ActionOutcome::Applied)
    }

    /// Dispatch a typing-presence update for the current room.
    pub fn set_typing(&self, is_typing: bool) -> Result<ActionOutcome, SessionError> {
        let inner = self.shared.lock();
        let handle = inner.handle();
        let room_id = match inner.state.machine().check_typing(handle.is_some()) {
            Ok(room_id) => room_id.to_owned(),
            Err(reason) => {
                debug!(?reason, "set_typing skipped");
                return Ok(ActionOutcome::Skipped(reason));
            }
        };
        let Some(handle) = handle else {
            return Ok(ActionOutcome::Skipped(SkipReason::NotBound));
        };
        drop(inner);

        handle
            .send(OutboundMessage::TypingPresence {
                typing: is_typing,
                room_id,
            })
            .map(|()| ActionOutcome::Applied)
            .inspect_err(|err| debug!(error = %err, "typing update not delivered"))
    }

    fn prepare_enter(&self, nickname: &str) -> Result<(Arc<P::Handle>, u64), SkipReason> {
        let inner = self.shared.lock();
        let handle = inner.handle();
        inner.state.machine().check_enter(handle.is_some(), nickname)?;
        let Some(handle) = handle else {
            return Err(SkipReason::NotBound);
        };
        if nickname != inner.state.machine().nickname() {
            debug!(
                bound = inner.state.machine().nickname(),
                requested = nickname,
                "entering room with a nickname other than the bound one"
            );
        }
        Ok((handle, inner.generation))
    }

    fn establish(&self, nickname: String) -> Result<(), SessionError> {
        let mut inner = self.shared.lock();
        if inner.release_binding() {
            debug!("released previous binding before rebinding");
        }

        let (sink, events) = ConnectionEventSink::new();
        let handle = match self.provider.bind(sink) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(error = %err, %nickname, "failed to bind connection");
                inner.state.rebind(nickname, None);
                inner.state.set_error_text(err.banner_text("connect"));
                self.shared.publish(&inner.state);
                return Err(err);
            }
        };

        info!(%nickname, generation = inner.generation, "connection bound");
        inner.state.rebind(nickname, handle.participant_id());
        let generation = inner.generation;
        let pump = tokio::spawn(run_event_pump(
            Arc::clone(&self.shared),
            generation,
            events,
        ));
        inner.binding = Some(Binding {
            handle: Arc::new(handle),
            pump,
        });
        self.shared.publish(&inner.state);
        Ok(())
    }
}

impl<P: ConnectionProvider> Drop for SessionCoordinator<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_event_pump<H>(
    shared: Arc<Shared<H>>,
    generation: u64,
    mut events: ConnectionEventReceiver,
) {
    debug!(generation, "connection event pump started");
    while let Some(event) = events.recv().await {
        let mut inner = shared.lock();
        if inner.generation != generation {
            break;
        }
        if inner.state.apply(event).is_mutation() {
            shared.publish(&inner.state);
        }
    }
    debug!(generation, "connection event pump exiting");
}
