//! Client-side mirror of one lobby.
//!
//! The server owns the truth; this module folds the stream of lobby events
//! into an eventually-consistent local snapshot used to render the roster
//! and to gate the host's start-game action.

use tracing::{debug, warn};

use crate::messages::{PlayerInfo, ServerToClient};

/// Smallest lobby the server will start a game for.
pub const MIN_LOBBY_PLAYERS: u8 = 2;
/// Largest roster a lobby can hold.
pub const MAX_LOBBY_PLAYERS: u8 = 8;

/// Local copy of one lobby's state. `players` is ordered; the order is the
/// turn order and only changes via `players_reordered` or `lobby_state`.
#[derive(Debug, Clone, PartialEq)]
pub struct LobbySnapshot {
    pub lobby_id: String,
    pub game_name: String,
    pub max_players: u8,
    pub host_id: String,
    pub players: Vec<PlayerInfo>,
}

/// What applying one event did to the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The mirror changed (or the event was a valid no-op on it).
    Updated,
    /// The event referenced state this mirror does not have; the caller
    /// should re-request a full `lobby_state` rather than guess.
    ResyncNeeded,
    /// The lobby was closed and the mirror discarded.
    Closed,
    /// The event does not concern the lobby mirror.
    Ignored,
}

/// Folds lobby events into a [`LobbySnapshot`].
///
/// Constructed with the local player's identity so that `lobby_created`,
/// which carries no roster, can seed a one-player lobby.
#[derive(Debug, Clone)]
pub struct LobbyMirror {
    local_id: String,
    local_username: String,
    local_avatar_id: String,
    lobby: Option<LobbySnapshot>,
}

impl LobbyMirror {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        avatar_id: impl Into<String>,
    ) -> Self {
        Self {
            local_id: user_id.into(),
            local_username: username.into(),
            local_avatar_id: avatar_id.into(),
            lobby: None,
        }
    }

    pub fn lobby(&self) -> Option<&LobbySnapshot> {
        self.lobby.as_ref()
    }

    /// Apply one inbound event as a pure transformation of the snapshot.
    pub fn apply(&mut self, msg: &ServerToClient) -> Applied {
        match msg {
            ServerToClient::LobbyCreated {
                lobby_id,
                game_name,
                max_players,
                is_host,
            } => {
                // The creator is the only member so far; a host counts as
                // ready from the moment the lobby exists.
                self.lobby = Some(LobbySnapshot {
                    lobby_id: lobby_id.clone(),
                    game_name: game_name.clone(),
                    max_players: *max_players,
                    host_id: if *is_host {
                        self.local_id.clone()
                    } else {
                        String::new()
                    },
                    players: vec![PlayerInfo {
                        id: self.local_id.clone(),
                        username: self.local_username.clone(),
                        avatar_id: self.local_avatar_id.clone(),
                        ready: *is_host,
                        is_host: *is_host,
                    }],
                });
                debug!("lobby {} created locally", lobby_id);
                Applied::Updated
            }

            ServerToClient::LobbyState {
                lobby_id,
                game_name,
                max_players,
                host_id,
                players,
            } => {
                // Full replace: the authoritative resync message
                self.lobby = Some(LobbySnapshot {
                    lobby_id: lobby_id.clone(),
                    game_name: game_name.clone(),
                    max_players: *max_players,
                    host_id: host_id.clone(),
                    players: players.clone(),
                });
                Applied::Updated
            }

            ServerToClient::PlayerJoined {
                user_id,
                username,
                avatar_id,
                is_host,
                ready,
            } => {
                let Some(lobby) = self.lobby.as_mut() else {
                    return Applied::Ignored;
                };
                let entry = PlayerInfo {
                    id: user_id.clone(),
                    username: username.clone(),
                    avatar_id: avatar_id.clone(),
                    ready: *ready,
                    is_host: *is_host,
                };
                // A rejoining player replaces its stale entry in place
                if let Some(existing) = lobby.players.iter_mut().find(|p| p.id == *user_id) {
                    *existing = entry;
                } else {
                    lobby.players.push(entry);
                }
                Applied::Updated
            }

            ServerToClient::PlayerLeft { user_id } => {
                let Some(lobby) = self.lobby.as_mut() else {
                    return Applied::Ignored;
                };
                lobby.players.retain(|p| p.id != *user_id);
                Applied::Updated
            }

            ServerToClient::PlayerReadyChanged { user_id, ready } => {
                let Some(lobby) = self.lobby.as_mut() else {
                    return Applied::Ignored;
                };
                match lobby.players.iter_mut().find(|p| p.id == *user_id) {
                    Some(player) => {
                        player.ready = *ready;
                        Applied::Updated
                    }
                    None => Applied::Ignored,
                }
            }

            ServerToClient::HostChanged { new_host_id } => {
                let Some(lobby) = self.lobby.as_mut() else {
                    return Applied::Ignored;
                };
                if lobby.players.iter().any(|p| p.id == *new_host_id) {
                    // Exclusive assignment: exactly one host at all times
                    for player in &mut lobby.players {
                        player.is_host = player.id == *new_host_id;
                    }
                    lobby.host_id = new_host_id.clone();
                    Applied::Updated
                } else {
                    // Likely raced with a player_left we have not folded the
                    // same way the server did; drop our host claim and ask
                    // the caller to resync.
                    warn!(
                        "host_changed names unknown player {}, resync required",
                        new_host_id
                    );
                    for player in &mut lobby.players {
                        player.is_host = false;
                    }
                    lobby.host_id.clear();
                    Applied::ResyncNeeded
                }
            }

            ServerToClient::PlayersReordered { player_order } => {
                let Some(lobby) = self.lobby.as_mut() else {
                    return Applied::Ignored;
                };
                // Consume matches from a scratch copy so a repeated id
                // cannot claim the same player twice
                let mut remaining = lobby.players.clone();
                let mut reordered = Vec::with_capacity(remaining.len());
                for id in player_order {
                    if let Some(pos) = remaining.iter().position(|p| p.id == *id) {
                        reordered.push(remaining.swap_remove(pos));
                    }
                }
                if !remaining.is_empty() {
                    // Incomplete, duplicated, or stale ordering; keep the
                    // roster intact
                    warn!("players_reordered does not cover the roster, resync required");
                    return Applied::ResyncNeeded;
                }
                lobby.players = reordered;
                Applied::Updated
            }

            ServerToClient::LobbyClosed { lobby_id } => {
                debug!("lobby {} closed, discarding mirror", lobby_id);
                self.lobby = None;
                Applied::Closed
            }

            ServerToClient::GameStarting { .. } | ServerToClient::Error { .. } => Applied::Ignored,
        }
    }

    /// True only when the roster is non-empty and every member is ready.
    /// This is the gate for enabling the host's start-game action.
    pub fn all_ready(&self) -> bool {
        self.lobby
            .as_ref()
            .map(|l| !l.players.is_empty() && l.players.iter().all(|p| p.ready))
            .unwrap_or(false)
    }

    pub fn host(&self) -> Option<&PlayerInfo> {
        self.lobby
            .as_ref()
            .and_then(|l| l.players.iter().find(|p| p.is_host))
    }

    pub fn is_local_host(&self) -> bool {
        self.host().map(|h| h.id == self.local_id).unwrap_or(false)
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn clear(&mut self) {
        self.lobby = None;
    }
}

/// Which screen the app should be on; driven only by received events or an
/// explicit leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Disconnected,
    InLobby,
    InGame,
}

impl SessionPhase {
    /// Next phase after folding one inbound event.
    pub fn on_event(self, msg: &ServerToClient) -> SessionPhase {
        match (self, msg) {
            (SessionPhase::Disconnected, ServerToClient::LobbyCreated { .. })
            | (SessionPhase::Disconnected, ServerToClient::LobbyState { .. }) => {
                SessionPhase::InLobby
            }
            (SessionPhase::InLobby, ServerToClient::GameStarting { .. }) => SessionPhase::InGame,
            (SessionPhase::InLobby, ServerToClient::LobbyClosed { .. }) => {
                SessionPhase::Disconnected
            }
            (phase, _) => phase,
        }
    }

    /// Explicit user action; valid from any phase.
    pub fn on_leave(self) -> SessionPhase {
        SessionPhase::Disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn player(id: &str, ready: bool, is_host: bool) -> PlayerInfo {
        PlayerInfo {
            id: id.to_string(),
            username: format!("name-{id}"),
            avatar_id: format!("avatar-{id}"),
            ready,
            is_host,
        }
    }

    fn snapshot_event(players: Vec<PlayerInfo>, host_id: &str) -> ServerToClient {
        ServerToClient::LobbyState {
            lobby_id: "L1".to_string(),
            game_name: "Test".to_string(),
            max_players: 4,
            host_id: host_id.to_string(),
            players,
        }
    }

    fn mirror_with(players: Vec<PlayerInfo>, host_id: &str) -> LobbyMirror {
        let mut mirror = LobbyMirror::new("u1", "Alice", "avatar1");
        assert_eq!(
            mirror.apply(&snapshot_event(players, host_id)),
            Applied::Updated
        );
        mirror
    }

    #[test]
    fn lobby_state_replaces_entirely() {
        let mut mirror = mirror_with(
            vec![player("u1", true, true), player("u9", false, false)],
            "u1",
        );
        let replacement = vec![player("u3", false, true)];
        mirror.apply(&snapshot_event(replacement.clone(), "u3"));

        let lobby = mirror.lobby().unwrap();
        assert_eq!(lobby.players, replacement);
        assert_eq!(lobby.host_id, "u3");
    }

    #[test]
    fn host_change_is_exclusive() {
        let mut mirror = mirror_with(
            vec![
                player("u1", true, true),
                player("u2", false, false),
                player("u3", false, false),
            ],
            "u1",
        );
        let outcome = mirror.apply(&ServerToClient::HostChanged {
            new_host_id: "u3".to_string(),
        });
        assert_eq!(outcome, Applied::Updated);

        let lobby = mirror.lobby().unwrap();
        let hosts: Vec<&str> = lobby
            .players
            .iter()
            .filter(|p| p.is_host)
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(hosts, vec!["u3"]);
        assert_eq!(lobby.host_id, "u3");
    }

    #[test]
    fn host_change_to_unknown_player_requests_resync() {
        let mut mirror = mirror_with(vec![player("u1", true, true)], "u1");
        let outcome = mirror.apply(&ServerToClient::HostChanged {
            new_host_id: "ghost".to_string(),
        });
        assert_eq!(outcome, Applied::ResyncNeeded);
        // No player keeps a stale host claim while we wait for the snapshot
        assert!(mirror.lobby().unwrap().players.iter().all(|p| !p.is_host));
    }

    #[test]
    fn ready_change_touches_only_the_ready_flag() {
        let mut mirror = mirror_with(
            vec![player("u1", true, true), player("u2", false, false)],
            "u1",
        );
        mirror.apply(&ServerToClient::PlayerReadyChanged {
            user_id: "u2".to_string(),
            ready: true,
        });

        let after = &mirror.lobby().unwrap().players[1];
        assert_eq!(after.ready, true);
        assert_eq!(after.username, "name-u2");
        assert_eq!(after.avatar_id, "avatar-u2");
        assert_eq!(after.is_host, false);
    }

    #[test]
    fn all_ready_edge_cases() {
        let empty = mirror_with(vec![], "");
        assert!(!empty.all_ready());

        let one_unready = mirror_with(
            vec![player("u1", true, true), player("u2", false, false)],
            "u1",
        );
        assert!(!one_unready.all_ready());

        let everyone = mirror_with(
            vec![player("u1", true, true), player("u2", true, false)],
            "u1",
        );
        assert!(everyone.all_ready());

        let no_lobby = LobbyMirror::new("u1", "Alice", "avatar1");
        assert!(!no_lobby.all_ready());
    }

    #[test]
    fn reorder_preserves_fields() {
        let mut mirror = mirror_with(
            vec![player("u1", true, true), player("u2", false, false)],
            "u1",
        );
        let outcome = mirror.apply(&ServerToClient::PlayersReordered {
            player_order: vec!["u2".to_string(), "u1".to_string()],
        });
        assert_eq!(outcome, Applied::Updated);

        let players = &mirror.lobby().unwrap().players;
        assert_eq!(players[0], player("u2", false, false));
        assert_eq!(players[1], player("u1", true, true));
    }

    #[test]
    fn incomplete_reorder_leaves_roster_intact() {
        let before = vec![player("u1", true, true), player("u2", false, false)];
        let mut mirror = mirror_with(before.clone(), "u1");
        let outcome = mirror.apply(&ServerToClient::PlayersReordered {
            player_order: vec!["u2".to_string()],
        });
        assert_eq!(outcome, Applied::ResyncNeeded);
        assert_eq!(mirror.lobby().unwrap().players, before);
    }

    #[test]
    fn reorder_with_duplicate_ids_leaves_roster_intact() {
        let before = vec![player("u1", true, true), player("u2", false, false)];
        let mut mirror = mirror_with(before.clone(), "u1");
        // Right length, but "u1" twice and "u2" never
        let outcome = mirror.apply(&ServerToClient::PlayersReordered {
            player_order: vec!["u1".to_string(), "u1".to_string()],
        });
        assert_eq!(outcome, Applied::ResyncNeeded);
        assert_eq!(mirror.lobby().unwrap().players, before);
    }

    #[test]
    fn rejoin_replaces_stale_entry() {
        let mut mirror = mirror_with(
            vec![player("u1", true, true), player("u2", true, false)],
            "u1",
        );
        mirror.apply(&ServerToClient::PlayerJoined {
            user_id: "u2".to_string(),
            username: "Bob".to_string(),
            avatar_id: "avatar9".to_string(),
            is_host: false,
            ready: false,
        });

        let players = &mirror.lobby().unwrap().players;
        assert_eq!(players.len(), 2);
        assert_eq!(players[1].username, "Bob");
        assert_eq!(players[1].ready, false);
    }

    #[test]
    fn events_without_a_lobby_are_ignored() {
        let mut mirror = LobbyMirror::new("u1", "Alice", "avatar1");
        let outcome = mirror.apply(&ServerToClient::PlayerLeft {
            user_id: "u2".to_string(),
        });
        assert_eq!(outcome, Applied::Ignored);
        assert!(mirror.lobby().is_none());
    }

    // Full lifecycle: create, join, ready up, close.
    #[test]
    fn create_join_ready_close_scenario() {
        let mut mirror = LobbyMirror::new("u1", "Alice", "avatar1");

        mirror.apply(&ServerToClient::LobbyCreated {
            lobby_id: "L1".to_string(),
            game_name: "Test".to_string(),
            max_players: 4,
            is_host: true,
        });
        let lobby = mirror.lobby().unwrap();
        assert_eq!(lobby.lobby_id, "L1");
        assert!(mirror.is_local_host());
        // Host alone counts as everyone-ready
        assert!(mirror.all_ready());

        mirror.apply(&ServerToClient::PlayerJoined {
            user_id: "u2".to_string(),
            username: "Bob".to_string(),
            avatar_id: "avatar2".to_string(),
            is_host: false,
            ready: false,
        });
        assert_eq!(mirror.lobby().unwrap().players.len(), 2);
        assert!(!mirror.all_ready());

        mirror.apply(&ServerToClient::PlayerReadyChanged {
            user_id: "u2".to_string(),
            ready: true,
        });
        assert!(mirror.all_ready());

        let outcome = mirror.apply(&ServerToClient::LobbyClosed {
            lobby_id: "L1".to_string(),
        });
        assert_eq!(outcome, Applied::Closed);
        assert!(mirror.lobby().is_none());
    }

    #[test]
    fn player_left_removes_matching_entry() {
        let mut mirror = mirror_with(
            vec![player("u1", true, true), player("u2", true, false)],
            "u1",
        );
        mirror.apply(&ServerToClient::PlayerLeft {
            user_id: "u2".to_string(),
        });
        assert_eq!(mirror.lobby().unwrap().players, vec![player("u1", true, true)]);

        // Removing someone already gone is a quiet no-op
        let outcome = mirror.apply(&ServerToClient::PlayerLeft {
            user_id: "u2".to_string(),
        });
        assert_eq!(outcome, Applied::Updated);
    }

    #[test]
    fn phase_machine_follows_events_only() {
        let phase = SessionPhase::default();
        assert_eq!(phase, SessionPhase::Disconnected);

        let created = ServerToClient::LobbyCreated {
            lobby_id: "L1".to_string(),
            game_name: "Test".to_string(),
            max_players: 4,
            is_host: true,
        };
        let starting = ServerToClient::GameStarting {
            lobby_id: "L1".to_string(),
            game_id: "G1".to_string(),
        };
        let closed = ServerToClient::LobbyClosed {
            lobby_id: "L1".to_string(),
        };

        let phase = phase.on_event(&created);
        assert_eq!(phase, SessionPhase::InLobby);

        // game_starting only matters from the lobby
        assert_eq!(
            SessionPhase::Disconnected.on_event(&starting),
            SessionPhase::Disconnected
        );

        let phase = phase.on_event(&starting);
        assert_eq!(phase, SessionPhase::InGame);

        // In game, lobby_closed no longer drives the screen; leaving does
        assert_eq!(phase.on_event(&closed), SessionPhase::InGame);
        assert_eq!(phase.on_leave(), SessionPhase::Disconnected);

        assert_eq!(
            SessionPhase::InLobby.on_event(&closed),
            SessionPhase::Disconnected
        );
    }
}
