use serde::{Deserialize, Serialize};

use super::MessageKind;

/// One lobby member as pushed by the server. The roster position of an entry
/// is meaningful (turn order) and is owned by the containing message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    pub id: String,
    pub username: String,
    #[serde(rename = "avatarId")]
    pub avatar_id: String,
    pub ready: bool,
    #[serde(rename = "isHost")]
    pub is_host: bool,
}

// Server to Client Messages
//
// Frames with an unrecognized `type` fail to decode; the connection drops
// them without disturbing later frames.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum ServerToClient {
    #[serde(rename = "lobby_created")]
    LobbyCreated {
        #[serde(rename = "lobbyId")]
        lobby_id: String,
        #[serde(rename = "gameName")]
        game_name: String,
        #[serde(rename = "maxPlayers")]
        max_players: u8,
        #[serde(rename = "isHost")]
        is_host: bool,
    },

    #[serde(rename = "player_joined")]
    PlayerJoined {
        #[serde(rename = "userId")]
        user_id: String,
        username: String,
        #[serde(rename = "avatarId")]
        avatar_id: String,
        #[serde(rename = "isHost")]
        is_host: bool,
        ready: bool,
    },

    #[serde(rename = "player_left")]
    PlayerLeft {
        #[serde(rename = "userId")]
        user_id: String,
    },

    #[serde(rename = "player_ready_changed")]
    PlayerReadyChanged {
        #[serde(rename = "userId")]
        user_id: String,
        ready: bool,
    },

    #[serde(rename = "game_starting")]
    GameStarting {
        #[serde(rename = "lobbyId")]
        lobby_id: String,
        #[serde(rename = "gameId")]
        game_id: String,
    },

    #[serde(rename = "players_reordered")]
    PlayersReordered {
        #[serde(rename = "playerOrder")]
        player_order: Vec<String>,
    },

    #[serde(rename = "host_changed")]
    HostChanged {
        #[serde(rename = "newHostId")]
        new_host_id: String,
    },

    // Authoritative full snapshot; wins over any partial update
    #[serde(rename = "lobby_state")]
    LobbyState {
        #[serde(rename = "lobbyId")]
        lobby_id: String,
        #[serde(rename = "gameName")]
        game_name: String,
        #[serde(rename = "maxPlayers")]
        max_players: u8,
        #[serde(rename = "hostId")]
        host_id: String,
        players: Vec<PlayerInfo>,
    },

    #[serde(rename = "lobby_closed")]
    LobbyClosed {
        #[serde(rename = "lobbyId")]
        lobby_id: String,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerToClient {
    /// Dispatcher routing key for this envelope.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::LobbyCreated { .. } => MessageKind::LobbyCreated,
            Self::PlayerJoined { .. } => MessageKind::PlayerJoined,
            Self::PlayerLeft { .. } => MessageKind::PlayerLeft,
            Self::PlayerReadyChanged { .. } => MessageKind::PlayerReadyChanged,
            Self::GameStarting { .. } => MessageKind::GameStarting,
            Self::PlayersReordered { .. } => MessageKind::PlayersReordered,
            Self::HostChanged { .. } => MessageKind::HostChanged,
            Self::LobbyState { .. } => MessageKind::LobbyState,
            Self::LobbyClosed { .. } => MessageKind::LobbyClosed,
            Self::Error { .. } => MessageKind::Error,
        }
    }
}
