// ============================================================================
// weft - Subscriber Collection
// Register/unregister change listeners and fan out notifications
// ============================================================================
//
// The leaf dependency of every observer. Subscribers are held weakly so an
// observer never keeps a dropped binding alive; removal and deduplication
// work by pointer identity. Notification snapshots the list before calling
// out, so a subscriber added during a notification pass is not called in
// that same pass.
// ============================================================================

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::core::flags::LifecycleFlags;
use crate::core::value::Value;

/// A change listener attached to a property observer.
pub trait Subscriber {
    fn handle_change(&self, new_value: &Value, old_value: &Value, flags: LifecycleFlags);
}

/// A single batched patch describing one macro-operation on a collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollectionChange {
    /// Contiguous replacement: `removed` items starting at `start` were
    /// replaced by `added` items.
    Splice {
        start: usize,
        removed: usize,
        added: usize,
    },
    /// Everything was removed.
    Clear { removed: usize },
    /// Items were reordered in place (sort, reverse).
    Reorder,
    /// Keyed insertions (map/set).
    Add { count: usize },
    /// Keyed removals (map/set).
    Remove { count: usize },
    /// Keyed overwrites (map).
    Update { count: usize },
}

/// A change listener attached to a collection observer. Receives one call
/// per macro-operation, or one call with the coalesced patch list when a
/// lifecycle batch closes.
pub trait CollectionSubscriber {
    fn handle_collection_change(&self, changes: &[CollectionChange], flags: LifecycleFlags);
}

// =============================================================================
// SUBSCRIBER COLLECTION
// =============================================================================

/// An unordered set of subscriber identities. Insertion is idempotent;
/// notification order is subscription order at fire time.
#[derive(Default)]
pub struct SubscriberCollection {
    subscribers: RefCell<Vec<Weak<dyn Subscriber>>>,
}

impl SubscriberCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns false if it was already registered.
    pub fn add(&self, subscriber: &Rc<dyn Subscriber>) -> bool {
        let mut list = self.subscribers.borrow_mut();
        list.retain(|w| w.strong_count() > 0);
        let weak = Rc::downgrade(subscriber);
        if list.iter().any(|w| Weak::ptr_eq(w, &weak)) {
            return false;
        }
        list.push(weak);
        true
    }

    /// Remove a subscriber by identity. Returns false if it was not
    /// registered.
    pub fn remove(&self, subscriber: &Rc<dyn Subscriber>) -> bool {
        let weak = Rc::downgrade(subscriber);
        let mut list = self.subscribers.borrow_mut();
        let before = list.len();
        list.retain(|w| w.strong_count() > 0 && !Weak::ptr_eq(w, &weak));
        list.len() < before
    }

    pub fn has_subscribers(&self) -> bool {
        self.subscribers
            .borrow()
            .iter()
            .any(|w| w.strong_count() > 0)
    }

    pub fn count(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Fan out a change to every current subscriber. The list is snapshotted
    /// first so callbacks may subscribe/unsubscribe freely.
    pub fn notify(&self, new_value: &Value, old_value: &Value, flags: LifecycleFlags) {
        let snapshot: Vec<Rc<dyn Subscriber>> = self
            .subscribers
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        for subscriber in snapshot {
            subscriber.handle_change(new_value, old_value, flags);
        }
    }
}

/// The collection-patch counterpart of [`SubscriberCollection`].
#[derive(Default)]
pub struct CollectionSubscriberCollection {
    subscribers: RefCell<Vec<Weak<dyn CollectionSubscriber>>>,
}

impl CollectionSubscriberCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscriber: &Rc<dyn CollectionSubscriber>) -> bool {
        let mut list = self.subscribers.borrow_mut();
        list.retain(|w| w.strong_count() > 0);
        let weak = Rc::downgrade(subscriber);
        if list.iter().any(|w| Weak::ptr_eq(w, &weak)) {
            return false;
        }
        list.push(weak);
        true
    }

    pub fn remove(&self, subscriber: &Rc<dyn CollectionSubscriber>) -> bool {
        let weak = Rc::downgrade(subscriber);
        let mut list = self.subscribers.borrow_mut();
        let before = list.len();
        list.retain(|w| w.strong_count() > 0 && !Weak::ptr_eq(w, &weak));
        list.len() < before
    }

    pub fn has_subscribers(&self) -> bool {
        self.subscribers
            .borrow()
            .iter()
            .any(|w| w.strong_count() > 0)
    }

    pub fn notify(&self, changes: &[CollectionChange], flags: LifecycleFlags) {
        let snapshot: Vec<Rc<dyn CollectionSubscriber>> = self
            .subscribers
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        for subscriber in snapshot {
            subscriber.handle_collection_change(changes, flags);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
