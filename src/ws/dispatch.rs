//! Fan-out of decoded messages to registered subscribers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Identifier for a registered subscriber, used to remove it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Delivers each decoded message to every registered subscriber.
///
/// Subscribers are invoked in registration order. A panicking subscriber
/// is caught and logged; delivery continues to the remaining subscribers
/// and the connection is unaffected.
pub struct Dispatcher<M> {
    handlers: RwLock<Vec<(HandlerId, Handler<M>)>>,
    next_id: AtomicU64,
}

impl<M> Default for Dispatcher<M> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<M> Dispatcher<M> {
    /// Register a subscriber. Returns an id for later removal.
    pub fn add(&self, handler: impl Fn(&M) + Send + Sync + 'static) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        // We can recover from a poisoned lock because the handler list has
        // no inconsistent intermediate state.
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a previously registered subscriber.
    ///
    /// Removing an unknown or already-removed id is a no-op.
    pub fn remove(&self, id: HandlerId) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(handler_id, _)| *handler_id != id);
    }

    /// Drop all subscribers. Used on terminal close.
    pub fn clear(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no subscribers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `message` to every subscriber in registration order.
    pub fn dispatch(&self, message: &M) {
        // Snapshot the handlers outside the lock so a subscriber may
        // register or remove handlers without deadlocking.
        let snapshot: Vec<(HandlerId, Handler<M>)> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, handler)| (*id, Arc::clone(handler)))
            .collect();

        for (id, handler) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                tracing::warn!(handler = id.0, "Subscriber panicked while handling a message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn subscribers_run_in_registration_order() {
        let dispatcher = Dispatcher::<String>::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            dispatcher.add(move |_msg: &String| {
                seen.lock().expect("lock poisoned").push(label);
            });
        }

        dispatcher.dispatch(&"hello".to_owned());
        assert_eq!(
            *seen.lock().expect("lock poisoned"),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn removed_subscriber_no_longer_receives() {
        let dispatcher = Dispatcher::<String>::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let keep = {
            let seen = Arc::clone(&seen);
            dispatcher.add(move |msg: &String| {
                seen.lock().expect("lock poisoned").push(format!("keep:{msg}"));
            })
        };
        let drop_me = {
            let seen = Arc::clone(&seen);
            dispatcher.add(move |msg: &String| {
                seen.lock().expect("lock poisoned").push(format!("drop:{msg}"));
            })
        };

        dispatcher.remove(drop_me);
        dispatcher.dispatch(&"a".to_owned());

        // Removing twice, or removing an unknown id, is harmless.
        dispatcher.remove(drop_me);
        dispatcher.dispatch(&"b".to_owned());

        assert_eq!(
            *seen.lock().expect("lock poisoned"),
            vec!["keep:a", "keep:b"]
        );
        let _ = keep;
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let dispatcher = Dispatcher::<String>::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        dispatcher.add(|_msg: &String| panic!("subscriber bug"));
        {
            let seen = Arc::clone(&seen);
            dispatcher.add(move |msg: &String| {
                seen.lock().expect("lock poisoned").push(msg.clone());
            });
        }

        // The panicking first subscriber must not stop delivery of either
        // this message or the next one.
        dispatcher.dispatch(&"n".to_owned());
        dispatcher.dispatch(&"n+1".to_owned());

        assert_eq!(*seen.lock().expect("lock poisoned"), vec!["n", "n+1"]);
    }

    #[test]
    fn clear_drops_all_subscribers() {
        let dispatcher = Dispatcher::<String>::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let seen = Arc::clone(&seen);
            dispatcher.add(move |msg: &String| {
                seen.lock().expect("lock poisoned").push(msg.clone());
            });
        }
        assert_eq!(dispatcher.len(), 1);

        dispatcher.clear();
        assert!(dispatcher.is_empty());

        dispatcher.dispatch(&"ignored".to_owned());
        assert!(seen.lock().expect("lock poisoned").is_empty());
    }

    #[test]
    fn subscriber_may_remove_itself_during_dispatch() {
        let dispatcher = Arc::new(Dispatcher::<String>::default());
        let seen = Arc::new(Mutex::new(0_usize));

        let id_slot = Arc::new(Mutex::new(None::<HandlerId>));
        let id = {
            let inner = Arc::clone(&dispatcher);
            let id_slot = Arc::clone(&id_slot);
            let seen = Arc::clone(&seen);
            dispatcher.add(move |_msg: &String| {
                *seen.lock().expect("lock poisoned") += 1;
                if let Some(id) = *id_slot.lock().expect("lock poisoned") {
                    inner.remove(id);
                }
            })
        };
        *id_slot.lock().expect("lock poisoned") = Some(id);

        dispatcher.dispatch(&"once".to_owned());
        dispatcher.dispatch(&"never".to_owned());

        assert_eq!(*seen.lock().expect("lock poisoned"), 1);
    }
}
