//! Screen-level consumer of the lobby event stream.
//!
//! [`LobbySession`] plays the role the lobby screen plays in the app: it
//! subscribes to every lobby-related kind on a dispatcher, folds events into
//! a shared [`LobbyMirror`], tracks which screen should be showing, and
//! retains the last server error for display. Only one session should be
//! attached to a dispatcher at a time; a second one would double-handle
//! events (caller discipline, not enforced here).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::dispatcher::{EventDispatcher, HandlerId};
use crate::lobby_state::{Applied, LobbyMirror, LobbySnapshot, SessionPhase};
use crate::messages::{MessageKind, ServerToClient};

const LOBBY_KINDS: [MessageKind; 10] = [
    MessageKind::LobbyCreated,
    MessageKind::PlayerJoined,
    MessageKind::PlayerLeft,
    MessageKind::PlayerReadyChanged,
    MessageKind::GameStarting,
    MessageKind::PlayersReordered,
    MessageKind::HostChanged,
    MessageKind::LobbyState,
    MessageKind::LobbyClosed,
    MessageKind::Error,
];

pub struct LobbySession {
    mirror: Arc<Mutex<LobbyMirror>>,
    phase: Arc<Mutex<SessionPhase>>,
    last_error: Arc<Mutex<Option<String>>>,
    resync_needed: Arc<AtomicBool>,
    dispatcher: EventDispatcher,
    subscriptions: Vec<(MessageKind, HandlerId)>,
}

impl LobbySession {
    /// Subscribe to all lobby-related kinds on `dispatcher`. The identity is
    /// the local player's, used to seed the roster on `lobby_created`.
    pub fn attach(
        dispatcher: &EventDispatcher,
        user_id: impl Into<String>,
        username: impl Into<String>,
        avatar_id: impl Into<String>,
    ) -> Self {
        let mirror = Arc::new(Mutex::new(LobbyMirror::new(user_id, username, avatar_id)));
        let phase = Arc::new(Mutex::new(SessionPhase::default()));
        let last_error = Arc::new(Mutex::new(None));
        let resync_needed = Arc::new(AtomicBool::new(false));

        let fold: Arc<dyn Fn(&ServerToClient) + Send + Sync> = {
            let mirror = Arc::clone(&mirror);
            let phase = Arc::clone(&phase);
            let last_error = Arc::clone(&last_error);
            let resync_needed = Arc::clone(&resync_needed);
            Arc::new(move |msg: &ServerToClient| {
                if let ServerToClient::Error { message } = msg {
                    warn!("server error: {}", message);
                    *lock(&last_error) = Some(message.clone());
                    return;
                }
                let outcome = lock(&mirror).apply(msg);
                if outcome == Applied::ResyncNeeded {
                    resync_needed.store(true, Ordering::SeqCst);
                }
                let mut phase = lock(&phase);
                *phase = phase.on_event(msg);
            })
        };

        let subscriptions = LOBBY_KINDS
            .into_iter()
            .map(|kind| {
                let fold = Arc::clone(&fold);
                (kind, dispatcher.on(kind, move |msg| (*fold)(msg)))
            })
            .collect();

        Self {
            mirror,
            phase,
            last_error,
            resync_needed,
            dispatcher: dispatcher.clone(),
            subscriptions,
        }
    }

    /// Current lobby mirror, if any.
    pub fn snapshot(&self) -> Option<LobbySnapshot> {
        lock(&self.mirror).lobby().cloned()
    }

    pub fn phase(&self) -> SessionPhase {
        *lock(&self.phase)
    }

    /// Gate for the host's start-game button.
    pub fn all_ready(&self) -> bool {
        lock(&self.mirror).all_ready()
    }

    pub fn is_local_host(&self) -> bool {
        lock(&self.mirror).is_local_host()
    }

    /// Last server-sent error, consumed on read (the screen shows it once).
    pub fn take_error(&self) -> Option<String> {
        lock(&self.last_error).take()
    }

    /// True when the mirror saw an event it could not reconcile and a fresh
    /// `lobby_state` should be requested. Consumed on read.
    pub fn take_resync_needed(&self) -> bool {
        self.resync_needed.swap(false, Ordering::SeqCst)
    }

    /// Explicit user action: drop the mirror and return to the lobby list.
    /// The caller still sends `leave_lobby` through the connection.
    pub fn leave(&self) {
        lock(&self.mirror).clear();
        let mut phase = lock(&self.phase);
        *phase = phase.on_leave();
    }

    /// Remove all subscriptions. Called automatically on drop.
    pub fn detach(&mut self) {
        for (kind, id) in self.subscriptions.drain(..) {
            self.dispatcher.off(kind, id);
        }
    }
}

impl Drop for LobbySession {
    fn drop(&mut self) {
        self.detach();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
