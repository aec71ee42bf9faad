// ============================================================================
// weft - Observed Collections
// Wrapped mutators emitting one batched patch per macro-operation
// ============================================================================
//
// A bulk mutation (splice, clear, sort) notifies subscribers once with a
// single patch, never per element. While a lifecycle batch is open the
// patches coalesce further: the observer parks them and registers itself on
// the batch queue, and subscribers see the whole patch list in one call when
// the outermost batch closes.
// ============================================================================

pub mod array;
pub mod map;
pub mod set;

pub use array::ObservedArray;
pub use map::ObservedMap;
pub use set::ObservedSet;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::core::flags::LifecycleFlags;
use crate::lifecycle::{BatchItem, Lifecycle};
use crate::observation::subscriber::{
    CollectionChange, CollectionSubscriber, CollectionSubscriberCollection,
};

/// The single observer attached to one observed collection.
pub struct CollectionObserver {
    subscribers: CollectionSubscriberCollection,
    /// Patches parked while a lifecycle batch is open.
    pending: RefCell<Vec<CollectionChange>>,
    in_batch: Cell<bool>,
    lifecycle: RefCell<Option<Rc<Lifecycle>>>,
}

impl CollectionObserver {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            subscribers: CollectionSubscriberCollection::new(),
            pending: RefCell::new(Vec::new()),
            in_batch: Cell::new(false),
            lifecycle: RefCell::new(None),
        })
    }

    /// Opt this collection into batch coalescing. Without a lifecycle every
    /// patch notifies immediately.
    pub fn attach_lifecycle(&self, lifecycle: Rc<Lifecycle>) {
        *self.lifecycle.borrow_mut() = Some(lifecycle);
    }

    pub fn subscribe(&self, subscriber: Rc<dyn CollectionSubscriber>) {
        self.subscribers.add(&subscriber);
    }

    pub fn unsubscribe(&self, subscriber: &Rc<dyn CollectionSubscriber>) {
        self.subscribers.remove(subscriber);
    }

    pub fn has_subscribers(&self) -> bool {
        self.subscribers.has_subscribers()
    }

    pub(crate) fn notify(self: &Rc<Self>, change: CollectionChange) {
        let batching = self
            .lifecycle
            .borrow()
            .as_ref()
            .filter(|lc| lc.is_batching())
            .cloned();

        match batching {
            Some(lifecycle) => {
                trace!(?change, "parking collection patch for batch flush");
                self.pending.borrow_mut().push(change);
                if !self.in_batch.replace(true) {
                    lifecycle.enqueue_batch(self.clone());
                }
            }
            None => self.subscribers.notify(&[change], LifecycleFlags::empty()),
        }
    }
}

impl BatchItem for CollectionObserver {
    fn flush_batch(&self, flags: LifecycleFlags) {
        self.in_batch.set(false);
        let changes: Vec<CollectionChange> = self.pending.borrow_mut().drain(..).collect();
        if !changes.is_empty() {
            self.subscribers.notify(&changes, flags);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
