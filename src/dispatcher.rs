use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::messages::{MessageKind, ServerToClient};

/// Callback invoked with the decoded envelope for its subscribed kind.
pub type Handler = dyn Fn(&ServerToClient) + Send + Sync;

/// Token returned by [`EventDispatcher::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
struct Registry {
    handlers: HashMap<MessageKind, Vec<(HandlerId, Arc<Handler>)>>,
    next_id: u64,
}

/// Routes inbound envelopes to subscribers, in subscription order per kind
/// and in arrival order across kinds. Cloning yields a handle to the same
/// registry.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to envelopes of `kind`. Registering the same
    /// closure twice invokes it twice per event.
    pub fn on<F>(&self, kind: MessageKind, handler: F) -> HandlerId
    where
        F: Fn(&ServerToClient) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = HandlerId(registry.next_id);
        registry.next_id += 1;
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription; unknown ids are a no-op.
    pub fn off(&self, kind: MessageKind, id: HandlerId) {
        let mut registry = self.lock();
        if let Some(list) = registry.handlers.get_mut(&kind) {
            list.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    /// Deliver one envelope to every subscriber of its kind. The handler
    /// list is snapshotted first, so a handler may subscribe or unsubscribe
    /// mid-dispatch without skipping or double-invoking anyone in this round.
    /// Kinds with no subscribers are silently ignored.
    pub fn dispatch(&self, msg: &ServerToClient) {
        let snapshot: Vec<Arc<Handler>> = {
            let registry = self.lock();
            registry
                .handlers
                .get(&msg.kind())
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };
        trace!("dispatching {:?} to {} handler(s)", msg.kind(), snapshot.len());
        for handler in snapshot {
            (*handler)(msg);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn left(user_id: &str) -> ServerToClient {
        ServerToClient::PlayerLeft {
            user_id: user_id.to_string(),
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&log);
        (log, move |tag| writer.lock().unwrap().push(tag))
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let dispatcher = EventDispatcher::new();
        let (log, record) = recorder();
        let record2 = record.clone();
        dispatcher.on(MessageKind::PlayerLeft, move |_| record("first"));
        dispatcher.on(MessageKind::PlayerLeft, move |_| record2("second"));

        dispatcher.dispatch(&left("u1"));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn removed_handler_is_never_invoked() {
        let dispatcher = EventDispatcher::new();
        let (log, record) = recorder();
        let id = dispatcher.on(MessageKind::PlayerLeft, move |_| record("gone"));
        dispatcher.off(MessageKind::PlayerLeft, id);

        dispatcher.dispatch(&left("u1"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn double_registration_fires_twice() {
        let dispatcher = EventDispatcher::new();
        let (log, record) = recorder();
        let record2 = record.clone();
        dispatcher.on(MessageKind::PlayerLeft, move |_| record("hit"));
        dispatcher.on(MessageKind::PlayerLeft, move |_| record2("hit"));

        dispatcher.dispatch(&left("u1"));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn off_with_unknown_id_is_a_no_op() {
        let dispatcher = EventDispatcher::new();
        let (log, record) = recorder();
        let id = dispatcher.on(MessageKind::PlayerLeft, move |_| record("kept"));
        dispatcher.off(MessageKind::PlayerJoined, id);
        dispatcher.off(MessageKind::PlayerLeft, id);
        // Second removal of the same id
        dispatcher.off(MessageKind::PlayerLeft, id);

        dispatcher.dispatch(&left("u1"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_during_dispatch_still_delivers_current_round() {
        let dispatcher = EventDispatcher::new();
        let (log, record) = recorder();
        let record2 = record.clone();

        let second_id = Arc::new(Mutex::new(None::<HandlerId>));
        let second_id_for_first = Arc::clone(&second_id);
        let dispatcher_for_first = dispatcher.clone();
        dispatcher.on(MessageKind::PlayerLeft, move |_| {
            record("first");
            if let Some(id) = *second_id_for_first.lock().unwrap() {
                dispatcher_for_first.off(MessageKind::PlayerLeft, id);
            }
        });
        let id = dispatcher.on(MessageKind::PlayerLeft, move |_| record2("second"));
        *second_id.lock().unwrap() = Some(id);

        // Snapshot semantics: the second handler still runs this round...
        dispatcher.dispatch(&left("u1"));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);

        // ...but not the next.
        dispatcher.dispatch(&left("u2"));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "first"]);
    }

    #[test]
    fn kinds_without_subscribers_are_ignored() {
        let dispatcher = EventDispatcher::new();
        // Must not panic or error
        dispatcher.dispatch(&left("u1"));
    }
}
