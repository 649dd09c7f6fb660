mod config;
mod logging;

use std::{error::Error, time::Duration};

use session_core::{ActionOutcome, SessionCoordinator, SessionSnapshot, SnapshotStream};
use session_loopback::{LoopbackConfig, LoopbackServer};
use tokio::time::timeout;
use tracing::{error, info};

use crate::config::SmokeConfig;

type SmokeResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() {
    logging::init();

    let config = match SmokeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    match run(&config).await {
        Ok(()) => println!("partychat smoke run passed"),
        Err(err) => {
            error!(error = %err, "smoke run failed");
            eprintln!("Smoke run failed: {err}");
            std::process::exit(1);
        }
    }
}

async fn run(config: &SmokeConfig) -> SmokeResult<()> {
    let server = LoopbackServer::new(LoopbackConfig {
        latency: config.loopback_latency,
    });

    let host = SessionCoordinator::initialize(server.clone(), config.host_nickname.as_str())?;
    let guest = SessionCoordinator::initialize(server.clone(), config.guest_nickname.as_str())?;
    let mut host_stream = host.subscribe();
    let mut guest_stream = guest.subscribe();

    settle(config.settle_timeout, &mut host_stream, "host connected", |s| {
        s.connection_status.is_connected()
    })
    .await?;
    settle(config.settle_timeout, &mut guest_stream, "guest connected", |s| {
        s.connection_status.is_connected()
    })
    .await?;

    expect_applied(
        "create room",
        host.create_room(&config.host_nickname, None).await?,
    )?;
    let room_id = host
        .snapshot()
        .session
        .room_id
        .ok_or("host has no room id after create")?;
    info!(%room_id, "host created room");

    expect_applied(
        "join room",
        guest
            .join_room(&room_id, &config.guest_nickname, None)
            .await?,
    )?;
    info!(
        history = guest.snapshot().messages.len(),
        "guest joined with history"
    );

    expect_applied("send message", guest.send_message(&config.greeting)?)?;
    let greeting = config.greeting.as_str();
    for (label, stream) in [("host", &mut host_stream), ("guest", &mut guest_stream)] {
        let snapshot = settle(config.settle_timeout, stream, "greeting echoed", |s| {
            s.messages.last().map(|message| message.body()) == Some(greeting)
        })
        .await?;
        if let Some(view) = snapshot.message_views.last() {
            info!(
                participant = label,
                from = %view.display_name,
                is_own = view.is_own,
                "greeting delivered"
            );
        }
    }

    expect_applied("start typing", guest.set_typing(true)?)?;
    let snapshot = settle(config.settle_timeout, &mut host_stream, "typing shown", |s| {
        s.typing_label().is_some()
    })
    .await?;
    info!(typing = ?snapshot.typing_users, "host sees typing");

    expect_applied("stop typing", guest.set_typing(false)?)?;
    settle(config.settle_timeout, &mut host_stream, "typing cleared", |s| {
        s.typing_users.is_empty()
    })
    .await?;

    guest.shutdown();
    host.shutdown();
    info!(rooms = server.room_count(), "smoke run finished");
    Ok(())
}

async fn settle<F>(
    limit: Duration,
    stream: &mut SnapshotStream,
    what: &str,
    predicate: F,
) -> SmokeResult<SessionSnapshot>
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    let snapshot = timeout(limit, stream.wait_for(predicate))
        .await
        .map_err(|_| format!("timed out waiting for {what}"))??
        .clone();
    Ok(snapshot)
}

fn expect_applied(action: &str, outcome: ActionOutcome) -> SmokeResult<()> {
    match outcome {
        ActionOutcome::Applied => Ok(()),
        other => Err(format!("{action} was not applied: {other:?}").into()),
    }
}
