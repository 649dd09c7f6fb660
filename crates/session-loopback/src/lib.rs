//! In-process room server speaking the partychat socket dialect.
//!
//! Every bound connection gets a participant id. Requests and broadcasts are
//! pushed through the JSON frame codec so the same decoding path as a remote
//! server is exercised.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use session_core::{
    ChatMessage, ConnectionEventSink, ConnectionHandle, ConnectionProvider, InboundEvent,
    OutboundMessage, RoomHistory, SessionError, SessionErrorCategory,
    wire::{self, RawSocketMessage},
};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Loopback server tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopbackConfig {
    /// Simulated round-trip delay for create/join requests.
    pub latency: Duration,
}

#[derive(Debug)]
struct Membership {
    room_id: String,
    nickname: String,
    icon: Option<String>,
}

#[derive(Debug)]
struct ConnectionEntry {
    sink: ConnectionEventSink,
    participant_id: String,
    membership: Option<Membership>,
    open: bool,
}

#[derive(Debug, Default)]
struct Room {
    members: Vec<u64>,
    typing: Vec<u64>,
    history: Vec<ChatMessage>,
}

#[derive(Debug, Default)]
struct Hub {
    next_connection_id: u64,
    connections: HashMap<u64, ConnectionEntry>,
    rooms: HashMap<String, Room>,
}

impl Hub {
    fn register(&mut self, sink: ConnectionEventSink) -> (u64, String) {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        let participant_id = Uuid::new_v4().to_string();
        self.connections.insert(
            id,
            ConnectionEntry {
                sink,
                participant_id: participant_id.clone(),
                membership: None,
                open: true,
            },
        );
        (id, participant_id)
    }

    fn require_open(&self, id: u64) -> Result<&ConnectionEntry, SessionError> {
        let entry = self
            .connections
            .get(&id)
            .ok_or_else(SessionError::connection_released)?;
        if !entry.open {
            return Err(SessionError::new(
                SessionErrorCategory::Network,
                "connection_closed",
                "connection was closed by the server",
            ));
        }
        Ok(entry)
    }

    fn create_room(
        &mut self,
        id: u64,
        nickname: &str,
        icon: Option<String>,
    ) -> Result<String, SessionError> {
        self.require_open(id)?;
        self.leave(id);

        let room_id = Uuid::new_v4().simple().to_string();
        let mut room = Room::default();
        room.history.push(ChatMessage::system(
            format!("{nickname} created the room"),
            now_millis(),
        ));
        room.members.push(id);
        self.rooms.insert(room_id.clone(), room);
        self.set_membership(id, &room_id, nickname, icon);

        info!(%room_id, connection = id, "loopback room created");
        Ok(room_id)
    }

    fn join_room(
        &mut self,
        id: u64,
        nickname: &str,
        room_id: &str,
        icon: Option<String>,
    ) -> Result<RoomHistory, SessionError> {
        self.require_open(id)?;
        if !self.rooms.contains_key(room_id) {
            return Err(SessionError::room_not_found(room_id));
        }
        self.leave(id);

        let notice = ChatMessage::system(format!("{nickname} joined the room"), now_millis());
        let history = match self.rooms.get_mut(room_id) {
            Some(room) => {
                let history = room.history.clone();
                room.history.push(notice.clone());
                history
            }
            None => return Err(SessionError::room_not_found(room_id)),
        };
        self.broadcast(room_id, &InboundEvent::Chat(notice));
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.members.push(id);
        }
        self.set_membership(id, room_id, nickname, icon);

        info!(%room_id, connection = id, history = history.len(), "loopback room joined");
        Ok(RoomHistory { messages: history })
    }

    fn handle_frame(&mut self, id: u64, frame: &RawSocketMessage) -> Result<(), SessionError> {
        self.require_open(id)?;
        match wire::decode_outbound(frame)? {
            OutboundMessage::Chat { body } => self.chat(id, body),
            OutboundMessage::TypingPresence { typing, room_id } => {
                self.typing(id, typing, &room_id)
            }
        }
    }

    fn chat(&mut self, id: u64, body: String) -> Result<(), SessionError> {
        let entry = self.require_open(id)?;
        let Some(membership) = &entry.membership else {
            return Err(SessionError::not_in_room());
        };
        let room_id = membership.room_id.clone();
        let message = ChatMessage::User {
            user_nickname: membership.nickname.clone(),
            body,
            timestamp_ms: now_millis(),
            user_icon: membership.icon.clone(),
            participant_id: Some(entry.participant_id.clone()),
        };

        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.history.push(message.clone());
        }
        trace!(%room_id, connection = id, "broadcasting chat message");
        self.broadcast(&room_id, &InboundEvent::Chat(message));
        Ok(())
    }

    fn typing(&mut self, id: u64, typing: bool, room_id: &str) -> Result<(), SessionError> {
        let entry = self.require_open(id)?;
        let in_room = entry
            .membership
            .as_ref()
            .is_some_and(|membership| membership.room_id == room_id);
        if !in_room {
            return Err(SessionError::not_in_room());
        }

        let Some(room) = self.rooms.get_mut(room_id) else {
            return Err(SessionError::room_not_found(room_id));
        };
        let already = room.typing.contains(&id);
        match (typing, already) {
            (true, false) => room.typing.push(id),
            (false, true) => room.typing.retain(|member| *member != id),
            _ => {}
        }
        self.broadcast_typing(room_id);
        Ok(())
    }

    fn release(&mut self, id: u64) {
        self.leave(id);
        if self.connections.remove(&id).is_some() {
            debug!(connection = id, "loopback connection released");
        }
    }

    fn leave(&mut self, id: u64) {
        let Some(membership) = self
            .connections
            .get_mut(&id)
            .and_then(|entry| entry.membership.take())
        else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&membership.room_id) else {
            return;
        };

        room.members.retain(|member| *member != id);
        let was_typing = room.typing.contains(&id);
        room.typing.retain(|member| *member != id);
        let notice = ChatMessage::system(
            format!("{} left the room", membership.nickname),
            now_millis(),
        );
        room.history.push(notice.clone());

        self.broadcast(&membership.room_id, &InboundEvent::Chat(notice));
        if was_typing {
            self.broadcast_typing(&membership.room_id);
        }
    }

    fn set_membership(&mut self, id: u64, room_id: &str, nickname: &str, icon: Option<String>) {
        if let Some(entry) = self.connections.get_mut(&id) {
            entry.membership = Some(Membership {
                room_id: room_id.to_owned(),
                nickname: nickname.to_owned(),
                icon,
            });
        }
    }

    fn broadcast_typing(&self, room_id: &str) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        let users_typing = room
            .typing
            .iter()
            .filter_map(|id| self.connections.get(id))
            .filter_map(|entry| entry.membership.as_ref())
            .map(|membership| membership.nickname.clone())
            .collect();
        self.broadcast(room_id, &InboundEvent::TypingPresence { users_typing });
    }

    fn broadcast(&self, room_id: &str, event: &InboundEvent) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        let frame = wire::encode_inbound(event);
        for member in &room.members {
            let Some(entry) = self.connections.get(member) else {
                continue;
            };
            if !entry.open {
                continue;
            }
            if entry.sink.message(wire::classify_inbound(&frame)).is_err() {
                trace!(connection = member, "skipping broadcast to dropped receiver");
            }
        }
    }

    fn disconnect_all(&mut self) -> usize {
        let mut closed = 0;
        for entry in self.connections.values_mut() {
            if !entry.open {
                continue;
            }
            entry.open = false;
            let _ = entry.sink.closed();
            closed += 1;
        }
        closed
    }
}

/// Shared in-process room server. Cloning shares the same rooms.
#[derive(Debug, Clone, Default)]
pub struct LoopbackServer {
    hub: Arc<Mutex<Hub>>,
    config: LoopbackConfig,
}

impl LoopbackServer {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            hub: Arc::default(),
            config,
        }
    }

    pub fn room_count(&self) -> usize {
        self.hub().rooms.len()
    }

    /// Live (bound, unreleased) connections.
    pub fn connection_count(&self) -> usize {
        self.hub().connections.len()
    }

    /// Stored backlog of a room, oldest first.
    pub fn room_history(&self, room_id: &str) -> Option<Vec<ChatMessage>> {
        self.hub()
            .rooms
            .get(room_id)
            .map(|room| room.history.clone())
    }

    /// Close every open connection as if the server went away.
    pub fn disconnect_all(&self) {
        let closed = self.hub().disconnect_all();
        warn!(closed, "loopback server closed all connections");
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn round_trip(&self) {
        if self.config.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.latency).await;
        }
    }
}

impl ConnectionProvider for LoopbackServer {
    type Handle = LoopbackConnection;

    fn bind(&self, sink: ConnectionEventSink) -> Result<LoopbackConnection, SessionError> {
        let (id, participant_id) = self.hub().register(sink.clone());
        if let Err(err) = sink.ready() {
            self.hub().release(id);
            return Err(SessionError::new(
                SessionErrorCategory::Internal,
                "bind_failed",
                err.to_string(),
            ));
        }
        debug!(connection = id, %participant_id, "loopback connection bound");
        Ok(LoopbackConnection {
            id,
            participant_id,
            server: self.clone(),
        })
    }
}

/// Handle for one loopback connection.
#[derive(Debug)]
pub struct LoopbackConnection {
    id: u64,
    participant_id: String,
    server: LoopbackServer,
}

impl ConnectionHandle for LoopbackConnection {
    fn create_room(
        &self,
        nickname: &str,
        icon: Option<&str>,
    ) -> impl Future<Output = Result<String, SessionError>> + Send {
        let server = self.server.clone();
        let id = self.id;
        let nickname = nickname.to_owned();
        let icon = icon.map(str::to_owned);
        async move {
            server.round_trip().await;
            let mut hub = server.hub();
            hub.create_room(id, &nickname, icon)
        }
    }

    fn join_room(
        &self,
        nickname: &str,
        room_id: &str,
        icon: Option<&str>,
    ) -> impl Future<Output = Result<RoomHistory, SessionError>> + Send {
        let server = self.server.clone();
        let id = self.id;
        let nickname = nickname.to_owned();
        let room_id = room_id.to_owned();
        let icon = icon.map(str::to_owned);
        async move {
            server.round_trip().await;
            let history = server.hub().join_room(id, &nickname, &room_id, icon)?;
            wire::decode_history(wire::encode_history(&history))
        }
    }

    fn send(&self, message: OutboundMessage) -> Result<(), SessionError> {
        let frame = wire::encode_outbound(&message);
        self.server.hub().handle_frame(self.id, &frame)
    }

    fn participant_id(&self) -> Option<String> {
        Some(self.participant_id.clone())
    }

    fn release(&self) {
        self.server.hub().release(self.id);
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
