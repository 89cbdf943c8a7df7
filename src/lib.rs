//! Lobby session client for the card-game server.
//!
//! The server speaks JSON over WebSocket: every frame is
//! `{"type": <kind>, "payload": <object>}`. This crate owns the single live
//! connection ([`LobbyConnection`]), routes decoded envelopes to subscribers
//! ([`EventDispatcher`]), offers one typed sender per outbound kind, and
//! folds inbound lobby events into a local roster mirror ([`LobbyMirror`] /
//! [`LobbySession`]). All server responses arrive as asynchronous events
//! correlated by kind; nothing here blocks on a round trip.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod lobby_state;
pub mod messages;
pub mod session;

pub use config::ClientConfig;
pub use connection::{ConnectParams, ConnectionState, LobbyConnection};
pub use dispatcher::{EventDispatcher, HandlerId};
pub use lobby_state::{
    Applied, LobbyMirror, LobbySnapshot, MAX_LOBBY_PLAYERS, MIN_LOBBY_PLAYERS, SessionPhase,
};
pub use messages::{ClientToServer, MessageKind, PlayerInfo, ServerToClient};
pub use session::LobbySession;
