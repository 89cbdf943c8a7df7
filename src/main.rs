use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use lobby_client::{ClientConfig, ConnectParams, LobbyConnection, LobbySession, SessionPhase};

/// Demo client: connects, creates a lobby, and logs the roster as events
/// arrive. Endpoint and display name come from the command line.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = std::env::args().skip(1);
    let endpoint = args
        .next()
        .unwrap_or_else(|| lobby_client::config::DEFAULT_ENDPOINT.to_string());
    let username = args.next().unwrap_or_else(|| "Guest".to_string());

    let user_id = Uuid::new_v4().to_string();
    let connection = LobbyConnection::new(ClientConfig::new(endpoint));
    let session = LobbySession::attach(connection.dispatcher(), &user_id, &username, "avatar1");

    connection
        .connect(ConnectParams::new(&user_id, &username, "avatar1"))
        .await?;
    connection.create_lobby("Demo Game", 4).await;

    let mut last_phase = SessionPhase::Disconnected;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }

        if let Some(message) = session.take_error() {
            info!("server said: {}", message);
        }
        let phase = session.phase();
        if phase != last_phase {
            info!("phase is now {:?}", phase);
            last_phase = phase;
        }
        if let Some(lobby) = session.snapshot() {
            info!(
                "lobby {} ({}/{} players, all ready: {})",
                lobby.lobby_id,
                lobby.players.len(),
                lobby.max_players,
                session.all_ready()
            );
        }
    }

    connection.leave_lobby().await;
    connection.disconnect().await;
    Ok(())
}
