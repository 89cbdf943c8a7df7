use serde::{Deserialize, Serialize};

// Client to Server Messages
//
// Every outbound frame is `{"type": <kind>, "payload": <object>}` on the wire,
// hence the adjacently-tagged representation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum ClientToServer {
    #[serde(rename = "create_lobby")]
    CreateLobby {
        #[serde(rename = "gameName")]
        game_name: String,
        #[serde(rename = "maxPlayers")]
        max_players: u8,
    },

    #[serde(rename = "join_lobby")]
    JoinLobby {
        #[serde(rename = "lobbyId")]
        lobby_id: String,
    },

    #[serde(rename = "leave_lobby")]
    LeaveLobby {},

    #[serde(rename = "toggle_ready")]
    ToggleReady {},

    #[serde(rename = "start_game")]
    StartGame {},

    // Order validation is the server's job; the client only ships the ids
    #[serde(rename = "reorder_players")]
    ReorderPlayers {
        #[serde(rename = "playerOrder")]
        player_order: Vec<String>,
    },

    #[serde(rename = "list_lobbies")]
    ListLobbies {},
}

impl ClientToServer {
    // Simple, safe JSON conversion - no unwrapping!
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"leave_lobby","payload":{}}"#.to_string())
    }
}
