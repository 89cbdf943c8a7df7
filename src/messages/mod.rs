mod msg_client_to_server;
mod msg_server_to_client;

pub use self::msg_client_to_server::*;
pub use self::msg_server_to_client::*;

/// Routing key for inbound envelopes, one per [`ServerToClient`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    LobbyCreated,
    PlayerJoined,
    PlayerLeft,
    PlayerReadyChanged,
    GameStarting,
    PlayersReordered,
    HostChanged,
    LobbyState,
    LobbyClosed,
    Error,
}
