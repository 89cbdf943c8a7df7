use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::dispatcher::{EventDispatcher, HandlerId};
use crate::messages::{ClientToServer, MessageKind, ServerToClient};

/// Lifecycle of the single transport owned by a [`LobbyConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Identity sent to the server as URL query parameters. `lobby_id` lets a
/// reconnecting client rejoin its lobby and receive a fresh snapshot.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub user_id: String,
    pub username: String,
    pub avatar_id: String,
    pub lobby_id: Option<String>,
}

impl ConnectParams {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        avatar_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            avatar_id: avatar_id.into(),
            lobby_id: None,
        }
    }

    pub fn with_lobby(mut self, lobby_id: impl Into<String>) -> Self {
        self.lobby_id = Some(lobby_id.into());
        self
    }
}

/// Owns at most one live WebSocket to the lobby server and keeps it alive
/// with capped exponential-backoff reconnection.
///
/// Cloning yields another handle to the same connection; all clones share
/// the transport, dispatcher and state. Inbound frames are decoded and fed
/// to the dispatcher in arrival order; undecodable frames are dropped with
/// a log line and never disturb the connection.
pub struct LobbyConnection {
    config: ClientConfig,
    dispatcher: EventDispatcher,
    state: Arc<RwLock<ConnectionState>>,
    writer: Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>,
    params: Arc<Mutex<Option<ConnectParams>>>,
    attempts: Arc<AtomicU32>,
    intentional_disconnect: Arc<AtomicBool>,
    // Bumped per transport; stale pump tasks compare against it and bow out
    generation: Arc<AtomicU64>,
    reconnect_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LobbyConnection {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            dispatcher: EventDispatcher::new(),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            writer: Arc::new(Mutex::new(None)),
            params: Arc::new(Mutex::new(None)),
            attempts: Arc::new(AtomicU32::new(0)),
            intentional_disconnect: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            reconnect_task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Subscribe to inbound envelopes of `kind`.
    pub fn on<F>(&self, kind: MessageKind, handler: F) -> HandlerId
    where
        F: Fn(&ServerToClient) + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, handler)
    }

    /// Remove a subscription made with [`LobbyConnection::on`].
    pub fn off(&self, kind: MessageKind, id: HandlerId) {
        self.dispatcher.off(kind, id)
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Open the transport with the given identity, tearing down any prior
    /// transport first. On success the reconnect-attempt counter resets to
    /// zero and later unexpected closes trigger automatic reconnection with
    /// the same parameters.
    pub async fn connect(&self, params: ConnectParams) -> Result<()> {
        self.teardown_existing().await;
        self.intentional_disconnect.store(false, Ordering::SeqCst);
        {
            let mut stored = self.params.lock().await;
            *stored = Some(params.clone());
        }
        self.open(params).await
    }

    /// Close the transport and cancel any pending reconnect. Idempotent;
    /// disconnecting while disconnected is a no-op.
    pub async fn disconnect(&self) {
        self.intentional_disconnect.store(true, Ordering::SeqCst);
        self.teardown_existing().await;
        self.set_state(ConnectionState::Disconnected).await;
    }

    /// Transmit one envelope. Fire-and-forget: when the transport is not in
    /// the Connected state the message is logged and dropped, never an
    /// error. Delivery is only confirmed by a later server event.
    pub async fn send(&self, msg: ClientToServer) {
        if self.state().await != ConnectionState::Connected {
            warn!("websocket is not connected, dropping {:?}", msg);
            return;
        }
        let writer = { self.writer.lock().await.clone() };
        match writer {
            Some(writer) => {
                let json = msg.to_json();
                debug!("sending {}", json);
                if writer.send(Message::Text(json)).is_err() {
                    warn!("write channel closed, message dropped");
                }
            }
            None => warn!("websocket is not connected, dropping {:?}", msg),
        }
    }

    // Typed senders, one per outbound kind. Business rules (player-count
    // bounds, host-only actions) are the caller's responsibility.

    pub async fn create_lobby(&self, game_name: impl Into<String>, max_players: u8) {
        self.send(ClientToServer::CreateLobby {
            game_name: game_name.into(),
            max_players,
        })
        .await;
    }

    pub async fn join_lobby(&self, lobby_id: impl Into<String>) {
        self.send(ClientToServer::JoinLobby {
            lobby_id: lobby_id.into(),
        })
        .await;
    }

    pub async fn leave_lobby(&self) {
        self.send(ClientToServer::LeaveLobby {}).await;
    }

    pub async fn toggle_ready(&self) {
        self.send(ClientToServer::ToggleReady {}).await;
    }

    pub async fn start_game(&self) {
        self.send(ClientToServer::StartGame {}).await;
    }

    pub async fn reorder_players(&self, player_order: Vec<String>) {
        self.send(ClientToServer::ReorderPlayers { player_order })
            .await;
    }

    pub async fn list_lobbies(&self) {
        self.send(ClientToServer::ListLobbies {}).await;
    }

    async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write().await;
        if *state != new_state {
            debug!("connection state {:?} -> {:?}", *state, new_state);
            *state = new_state;
        }
    }

    fn build_url(&self, params: &ConnectParams) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint).context("invalid endpoint url")?;
        url.query_pairs_mut()
            .append_pair("userId", &params.user_id)
            .append_pair("username", &params.username)
            .append_pair("avatarId", &params.avatar_id);
        if let Some(lobby_id) = &params.lobby_id {
            url.query_pairs_mut().append_pair("lobbyId", lobby_id);
        }
        Ok(url)
    }

    /// Drop the current transport (if any) and cancel a pending reconnect.
    /// Bumping the generation fences off the old pumps so their close event
    /// cannot race whatever comes next.
    async fn teardown_existing(&self) {
        if let Some(handle) = self.reconnect_task.lock().await.take() {
            handle.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.writer.lock().await.take().is_some() {
            // The write pump sends a Close frame and exits once its channel
            // closes
            info!("closing previous transport");
        }
    }

    // Boxed rather than `async fn`: the body spawns the read pump, whose
    // close path re-enters open() through the reconnect loop, so the future
    // type is recursive and must be erased somewhere on the cycle.
    fn open(&self, params: ConnectParams) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.set_state(ConnectionState::Connecting).await;
            let url = self.build_url(&params)?;

            let (ws_stream, _) = match connect_async(url.as_str()).await {
                Ok(ok) => ok,
                Err(e) => {
                    error!("failed to connect to {}: {}", self.config.endpoint, e);
                    self.set_state(ConnectionState::Disconnected).await;
                    return Err(e).context("websocket connect failed");
                }
            };

            info!("connected to {}", self.config.endpoint);
            self.attempts.store(0, Ordering::SeqCst);
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

            let (mut write, mut read) = ws_stream.split();
            let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Message>();
            {
                let mut writer = self.writer.lock().await;
                *writer = Some(writer_tx);
            }
            self.set_state(ConnectionState::Connected).await;

            // Write pump: serialize channel traffic onto the socket, close
            // on drop
            tokio::spawn(async move {
                while let Some(frame) = writer_rx.recv().await {
                    if let Err(e) = write.send(frame).await {
                        error!("failed to write to websocket: {}", e);
                        break;
                    }
                }
                let _ = write.send(Message::Close(None)).await;
            });

            // Read pump: decode, dispatch in arrival order, drive
            // reconnection
            let conn = self.clone();
            tokio::spawn(async move {
                while let Some(frame) = read.next().await {
                    if conn.generation.load(Ordering::SeqCst) != generation {
                        // A newer transport took over; this pump is done
                        return;
                    }
                    match frame {
                        Ok(Message::Text(text)) => {
                            match serde_json::from_str::<ServerToClient>(&text) {
                                Ok(msg) => {
                                    debug!("received {:?}", msg.kind());
                                    conn.dispatcher.dispatch(&msg);
                                }
                                Err(e) => {
                                    // One bad frame must not break the stream
                                    warn!("dropping undecodable frame: {}", e);
                                }
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!("server closed connection");
                            break;
                        }
                        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                        Ok(_) => {}
                        Err(e) => {
                            error!("websocket error: {}", e);
                            break;
                        }
                    }
                }
                conn.on_transport_closed(generation).await;
            });

            Ok(())
        })
    }

    async fn on_transport_closed(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        {
            let mut writer = self.writer.lock().await;
            *writer = None;
        }
        if self.intentional_disconnect.load(Ordering::SeqCst) {
            self.set_state(ConnectionState::Disconnected).await;
            return;
        }
        self.spawn_reconnect_loop().await;
    }

    async fn spawn_reconnect_loop(&self) {
        let conn = self.clone();
        let handle = tokio::spawn(async move { conn.reconnect_loop().await });
        let mut slot = self.reconnect_task.lock().await;
        *slot = Some(handle);
    }

    /// Retry with exponential backoff until connected, cancelled, or the
    /// attempt cap is hit. Exhaustion is terminal but recoverable: the
    /// caller gets no further automatic attempts and must call
    /// [`LobbyConnection::connect`] again.
    async fn reconnect_loop(&self) {
        loop {
            let attempt = self.attempts.load(Ordering::SeqCst);
            if attempt >= self.config.max_reconnect_attempts {
                error!(
                    "max reconnection attempts ({}) reached, giving up",
                    self.config.max_reconnect_attempts
                );
                self.set_state(ConnectionState::Disconnected).await;
                return;
            }
            self.set_state(ConnectionState::Reconnecting).await;
            self.attempts.store(attempt + 1, Ordering::SeqCst);

            let delay = self.config.reconnect_delay(attempt);
            info!(
                "attempting to reconnect ({}/{}) in {}ms",
                attempt + 1,
                self.config.max_reconnect_attempts,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;

            if self.intentional_disconnect.load(Ordering::SeqCst) {
                debug!("reconnect cancelled by disconnect()");
                self.set_state(ConnectionState::Disconnected).await;
                return;
            }

            let params = { self.params.lock().await.clone() };
            let Some(params) = params else {
                self.set_state(ConnectionState::Disconnected).await;
                return;
            };
            match self.open(params).await {
                Ok(()) => return,
                Err(e) => warn!("reconnect attempt {} failed: {}", attempt + 1, e),
            }
        }
    }
}

impl Clone for LobbyConnection {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            dispatcher: self.dispatcher.clone(),
            state: Arc::clone(&self.state),
            writer: Arc::clone(&self.writer),
            params: Arc::clone(&self.params),
            attempts: Arc::clone(&self.attempts),
            intentional_disconnect: Arc::clone(&self.intentional_disconnect),
            generation: Arc::clone(&self.generation),
            reconnect_task: Arc::clone(&self.reconnect_task),
        }
    }
}
