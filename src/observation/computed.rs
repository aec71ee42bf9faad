// ============================================================================
// weft - Computed Observer
// Observer for a derived slot: re-derives when a dependency fires
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::core::flags::LifecycleFlags;
use crate::core::value::Value;
use crate::observation::dirty_check::DirtyChecker;
use crate::observation::observed::ObservedObject;
use crate::observation::subscriber::{Subscriber, SubscriberCollection};
use crate::observation::{PropertyAccessor, PropertyObserver};

/// Observer for a computed slot.
///
/// With declared dependencies the locator subscribes this observer to each
/// dependency's observer; a dependency change re-derives the value and
/// notifies when the derived value actually changed. Without declared
/// dependencies the observer is registered with the dirty checker instead,
/// which drives [`check`](Self::check) from a persistent poll task.
pub struct ComputedObserver {
    key: Rc<str>,
    target: Weak<ObservedObject>,
    getter: Rc<dyn Fn(&ObservedObject) -> Value>,
    value: RefCell<Value>,
    dirty: Cell<bool>,
    subscribers: SubscriberCollection,
    /// Dependency observers, held to keep the subscriptions alive.
    deps: RefCell<Vec<Rc<dyn PropertyObserver>>>,
    /// Set for slots with no declared dependencies. The observer only holds
    /// a dirty-check entry while it has subscribers.
    dirty_checker: RefCell<Option<Weak<DirtyChecker>>>,
    weak_self: Weak<Self>,
}

impl ComputedObserver {
    pub(crate) fn new(
        key: Rc<str>,
        target: &Rc<ObservedObject>,
        getter: Rc<dyn Fn(&ObservedObject) -> Value>,
    ) -> Rc<Self> {
        let initial = (getter)(target);
        Rc::new_cyclic(|weak_self| Self {
            key,
            target: Rc::downgrade(target),
            getter,
            value: RefCell::new(initial),
            dirty: Cell::new(false),
            subscribers: SubscriberCollection::new(),
            deps: RefCell::new(Vec::new()),
            dirty_checker: RefCell::new(None),
            weak_self: weak_self.clone(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn attach_dependency(&self, observer: Rc<dyn PropertyObserver>) {
        self.deps.borrow_mut().push(observer);
    }

    pub(crate) fn set_dirty_checker(&self, checker: &Rc<DirtyChecker>) {
        *self.dirty_checker.borrow_mut() = Some(Rc::downgrade(checker));
    }

    fn checker(&self) -> Option<(Rc<DirtyChecker>, Rc<Self>)> {
        let checker = self.dirty_checker.borrow().as_ref()?.upgrade()?;
        let this = self.weak_self.upgrade()?;
        Some((checker, this))
    }

    /// Re-derive and notify when the value changed. Returns whether it did.
    /// A getter that transitively reaches back into this observer sees the
    /// cached value instead of re-deriving.
    pub(crate) fn check(&self, flags: LifecycleFlags) -> bool {
        if self.dirty.get() {
            return false;
        }
        let Some(target) = self.target.upgrade() else {
            return false;
        };
        self.dirty.set(true);
        let new_value = (self.getter)(&target);
        let old_value = self.value.replace(new_value.clone());
        self.dirty.set(false);

        if new_value != old_value {
            self.subscribers.notify(&new_value, &old_value, flags);
            true
        } else {
            false
        }
    }
}

impl Subscriber for ComputedObserver {
    fn handle_change(&self, _new_value: &Value, _old_value: &Value, flags: LifecycleFlags) {
        self.check(flags);
    }
}

impl PropertyAccessor for ComputedObserver {
    fn get_value(&self) -> Value {
        self.value.borrow().clone()
    }

    fn set_value(&self, _value: Value, _flags: LifecycleFlags) {
        warn!(property = &*self.key, "ignoring write to computed slot");
    }
}

impl PropertyObserver for ComputedObserver {
    /// The first subscriber of a polled slot registers the dirty-check
    /// entry; the last one leaving removes it, so the macro-task tier
    /// quiesces when nothing is watching.
    fn subscribe(&self, subscriber: Rc<dyn Subscriber>) {
        let first = !self.subscribers.has_subscribers();
        self.subscribers.add(&subscriber);
        if first {
            if let Some((checker, this)) = self.checker() {
                checker.add_entry(this);
            }
        }
    }

    fn unsubscribe(&self, subscriber: &Rc<dyn Subscriber>) {
        self.subscribers.remove(subscriber);
        if !self.subscribers.has_subscribers() {
            if let Some((checker, this)) = self.checker() {
                checker.remove_entry(&this);
            }
        }
    }

    fn has_subscribers(&self) -> bool {
        self.subscribers.has_subscribers()
    }
}

// =============================================================================
// TESTS
// =============================================================================
