use std::time::Duration;

use session_core::{
    ActionOutcome, ConnectionStatus, SessionCoordinator, SessionErrorCategory, SessionSnapshot,
    SnapshotStream,
};
use session_loopback::{LoopbackConfig, LoopbackServer};
use tokio::time::timeout;

const SETTLE: Duration = Duration::from_secs(2);

async fn settle<F>(stream: &mut SnapshotStream, predicate: F) -> SessionSnapshot
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    timeout(SETTLE, stream.wait_for(predicate))
        .await
        .expect("snapshot should settle in time")
        .expect("snapshot channel should stay open")
        .clone()
}

fn last_body(snapshot: &SessionSnapshot) -> Option<&str> {
    snapshot.messages.last().map(|message| message.body())
}

async fn connected(
    server: &LoopbackServer,
    nickname: &str,
) -> (SessionCoordinator<LoopbackServer>, SnapshotStream) {
    let coordinator =
        SessionCoordinator::initialize(server.clone(), nickname).expect("initialize should work");
    let mut stream = coordinator.subscribe();
    settle(&mut stream, |snapshot| {
        snapshot.connection_status == ConnectionStatus::Connected
    })
    .await;
    (coordinator, stream)
}

#[tokio::test]
async fn host_and_guest_share_messages_and_typing() {
    let server = LoopbackServer::new(LoopbackConfig {
        latency: Duration::from_millis(5),
    });
    let (alice, mut alice_stream) = connected(&server, "Alice").await;
    let (bob, mut bob_stream) = connected(&server, "Bob").await;

    let outcome = alice
        .create_room("Alice", None)
        .await
        .expect("create should work");
    assert_eq!(outcome, ActionOutcome::Applied);
    let room_id = alice
        .snapshot()
        .session
        .room_id
        .expect("host should hold a room id");
    assert!(alice.snapshot().session.joined);

    let outcome = bob
        .join_room(&room_id, "Bob", None)
        .await
        .expect("join should work");
    assert_eq!(outcome, ActionOutcome::Applied);
    let guest = bob.snapshot();
    assert_eq!(guest.session.room_id.as_deref(), Some(room_id.as_str()));
    assert_eq!(guest.messages.len(), 1);
    assert_eq!(guest.messages[0].body(), "Alice created the room");
    assert!(guest.message_views[0].is_system);

    settle(&mut alice_stream, |snapshot| {
        last_body(snapshot) == Some("Bob joined the room")
    })
    .await;

    assert_eq!(
        bob.send_message("hi").expect("send should work"),
        ActionOutcome::Applied
    );
    let host = settle(&mut alice_stream, |snapshot| last_body(snapshot) == Some("hi")).await;
    let guest = settle(&mut bob_stream, |snapshot| last_body(snapshot) == Some("hi")).await;

    let host_view = host.message_views.last().expect("host should see hi");
    assert_eq!(host_view.display_name, "Bob");
    assert!(!host_view.is_own);
    let guest_view = guest.message_views.last().expect("guest should see hi");
    assert!(guest_view.is_own);

    assert_eq!(
        bob.set_typing(true).expect("typing should work"),
        ActionOutcome::Applied
    );
    let host = settle(&mut alice_stream, |snapshot| !snapshot.typing_users.is_empty()).await;
    assert_eq!(host.typing_users, vec!["Bob".to_owned()]);
    assert_eq!(host.typing_label(), Some("Someone is typing..."));

    bob.set_typing(false).expect("typing should work");
    let host = settle(&mut alice_stream, |snapshot| snapshot.typing_users.is_empty()).await;
    assert_eq!(host.typing_label(), None);
}

#[tokio::test]
async fn joining_unknown_room_surfaces_banner() {
    let server = LoopbackServer::default();
    let (bob, _stream) = connected(&server, "Bob").await;

    let err = bob
        .join_room("no-such-room", "Bob", None)
        .await
        .expect_err("unknown room should be rejected");
    assert_eq!(err.category, SessionErrorCategory::Config);
    assert_eq!(err.code, "room_not_found");

    let snapshot = bob.snapshot();
    assert!(!snapshot.session.joined);
    assert!(
        snapshot
            .error_text
            .as_deref()
            .is_some_and(|text| text.contains("room_not_found"))
    );

    bob.clear_error();
    assert_eq!(bob.snapshot().error_text, None);
}

#[tokio::test]
async fn server_disconnect_flips_status() {
    let server = LoopbackServer::default();
    let (alice, mut stream) = connected(&server, "Alice").await;
    alice
        .create_room("Alice", None)
        .await
        .expect("create should work");

    server.disconnect_all();

    let snapshot = settle(&mut stream, |snapshot| {
        snapshot.connection_status == ConnectionStatus::Disconnected
    })
    .await;
    assert!(snapshot.session.joined);
}

#[tokio::test]
async fn shutdown_notifies_remaining_members() {
    let server = LoopbackServer::default();
    let (alice, mut alice_stream) = connected(&server, "Alice").await;
    let (bob, _bob_stream) = connected(&server, "Bob").await;
    alice
        .create_room("Alice", None)
        .await
        .expect("create should work");
    let room_id = alice
        .snapshot()
        .session
        .room_id
        .expect("host should hold a room id");
    bob.join_room(&room_id, "Bob", None)
        .await
        .expect("join should work");

    drop(bob);

    settle(&mut alice_stream, |snapshot| {
        last_body(snapshot) == Some("Bob left the room")
    })
    .await;
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn rebind_replaces_the_connection() {
    let server = LoopbackServer::default();
    let (alice, mut stream) = connected(&server, "Alice").await;
    assert_eq!(server.connection_count(), 1);

    alice.rebind("Alicia").expect("rebind should work");

    let snapshot = settle(&mut stream, |snapshot| {
        snapshot.session.nickname == "Alicia"
            && snapshot.connection_status == ConnectionStatus::Connected
    })
    .await;
    assert!(!snapshot.session.joined);
    assert_eq!(server.connection_count(), 1);
}
