//! Publish/subscribe registry for change events.
//!
//! # Invariants
//! - `publish` returns only after every handler subscribed at its start,
//!   and still subscribed at its turn, has been invoked.
//! - Handlers may subscribe, unsubscribe, query or publish re-entrantly.
//! - A panicking handler does not stop delivery to the others.
//! - `sequence` is strictly increasing per notifier.

use crate::model::quote::QuoteId;
use log::{debug, error};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Identifier of one registered handler.
pub type SubscriptionId = u64;

type ChangeHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Mutation committed to the quote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// One quote was inserted (new or restored).
    Inserted(QuoteId),
    /// A delete batch committed; ids in request order, deduplicated.
    Deleted(Vec<QuoteId>),
}

/// Event delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub sequence: u64,
    pub change: Change,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    last_sequence: AtomicU64,
    handlers: Mutex<BTreeMap<SubscriptionId, ChangeHandler>>,
}

impl Registry {
    fn handlers(&self) -> MutexGuard<'_, BTreeMap<SubscriptionId, ChangeHandler>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide change broadcast channel.
///
/// Cloning yields another handle to the same registry. Create one at
/// startup and inject it into every component that mutates or observes.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    registry: Arc<Registry>,
}

impl Debug for ChangeNotifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .field(
                "last_sequence",
                &self.registry.last_sequence.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler; it stays registered until the guard drops.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::SeqCst);
        self.registry.handlers().insert(id, Arc::new(handler));
        debug!("event=change_subscribe module=notify status=ok subscription_id={id}");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Removes a handler. Returns `false` when it was already gone.
    ///
    /// Safe to call from inside a handler, including the handler itself.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.handlers().remove(&id).is_some();
        if removed {
            debug!("event=change_unsubscribe module=notify status=ok subscription_id={id}");
        }
        removed
    }

    /// Number of currently registered handlers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.handlers().len()
    }

    /// Broadcasts one committed change to every subscriber.
    ///
    /// Must only be called after the corresponding store commit succeeded.
    pub fn publish(&self, change: Change) -> ChangeEvent {
        let sequence = self.registry.last_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = ChangeEvent { sequence, change };

        let snapshot = self
            .registry
            .handlers()
            .iter()
            .map(|(id, handler)| (*id, Arc::clone(handler)))
            .collect::<Vec<_>>();

        let mut delivered = 0usize;
        for (id, handler) in &snapshot {
            if !self.registry.handlers().contains_key(id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(
                    "event=change_publish module=notify status=error sequence={sequence} subscription_id={id} error_code=handler_panicked"
                ),
            }
        }

        debug!(
            "event=change_publish module=notify status=ok sequence={sequence} subscribers={} delivered={delivered}",
            snapshot.len()
        );
        event
    }
}

/// Registration guard returned by [`ChangeNotifier::subscribe`].
///
/// Dropping the guard unsubscribes the handler.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.handlers().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Change, ChangeNotifier};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[test]
    fn publish_reaches_every_subscriber_once() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let first_hits = Arc::clone(&hits);
        let _first = notifier.subscribe(move |_| {
            first_hits.fetch_add(1, Ordering::SeqCst);
        });
        let second_hits = Arc::clone(&hits);
        let _second = notifier.subscribe(move |_| {
            second_hits.fetch_add(1, Ordering::SeqCst);
        });

        notifier.publish(Change::Inserted(Uuid::new_v4()));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sequence_is_strictly_increasing() {
        let notifier = ChangeNotifier::new();
        let first = notifier.publish(Change::Deleted(vec![]));
        let second = notifier.publish(Change::Inserted(Uuid::new_v4()));
        assert!(second.sequence > first.sequence);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let subscription = notifier.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(notifier.subscriber_count(), 1);

        drop(subscription);
        notifier.publish(Change::Inserted(Uuid::new_v4()));

        assert_eq!(notifier.subscriber_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_can_unsubscribe_itself_during_publish() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let handle = notifier.clone();
        let counter = Arc::clone(&hits);
        let slot = Arc::clone(&own_id);
        let subscription = notifier.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *slot.lock().unwrap() {
                handle.unsubscribe(id);
            }
        });
        *own_id.lock().unwrap() = Some(subscription.id());

        notifier.publish(Change::Inserted(Uuid::new_v4()));
        notifier.publish(Change::Inserted(Uuid::new_v4()));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn handler_removed_mid_broadcast_is_skipped() {
        let notifier = ChangeNotifier::new();
        let late_hits = Arc::new(AtomicUsize::new(0));
        let victim = Arc::new(Mutex::new(None));

        let handle = notifier.clone();
        let target = Arc::clone(&victim);
        let _remover = notifier.subscribe(move |_| {
            if let Some(id) = *target.lock().unwrap() {
                handle.unsubscribe(id);
            }
        });
        let counter = Arc::clone(&late_hits);
        let late = notifier.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        *victim.lock().unwrap() = Some(late.id());

        notifier.publish(Change::Inserted(Uuid::new_v4()));
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_can_subscribe_during_publish_without_deadlock() {
        let notifier = ChangeNotifier::new();
        let spawned = Arc::new(Mutex::new(Vec::new()));

        let handle = notifier.clone();
        let store = Arc::clone(&spawned);
        let _outer = notifier.subscribe(move |_| {
            let nested = handle.subscribe(|_| {});
            store.lock().unwrap().push(nested);
        });

        notifier.publish(Change::Inserted(Uuid::new_v4()));
        assert_eq!(notifier.subscriber_count(), 2);
    }

    #[test]
    fn panicking_handler_does_not_block_others() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let _panicky = notifier.subscribe(|_| panic!("handler failure"));
        let counter = Arc::clone(&hits);
        let _healthy = notifier.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.publish(Change::Inserted(Uuid::new_v4()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
