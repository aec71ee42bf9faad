// ============================================================================
// weft - Setter Observer
// One instrumented data slot: authoritative value + change fan-out
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::flags::LifecycleFlags;
use crate::core::value::Value;
use crate::observation::subscriber::{Subscriber, SubscriberCollection};
use crate::observation::{PropertyAccessor, PropertyObserver};
use crate::scheduler::TaskPriority;

/// Observer for a plain data slot.
///
/// Holds the slot's authoritative value once installed. Every `set_value`
/// notifies all subscribers with (new, old) — there is no value-equality
/// suppression at this layer; bindings that want to skip no-op writes
/// compare before writing through.
pub struct SetterObserver {
    key: Rc<str>,
    value: RefCell<Value>,
    old_value: RefCell<Value>,
    flush_priority: Cell<TaskPriority>,
    subscribers: SubscriberCollection,
}

impl SetterObserver {
    pub(crate) fn new(key: Rc<str>, initial: Value) -> Rc<Self> {
        Rc::new(Self {
            key,
            value: RefCell::new(initial),
            old_value: RefCell::new(Value::Null),
            flush_priority: Cell::new(TaskPriority::Render),
            subscribers: SubscriberCollection::new(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn previous_value(&self) -> Value {
        self.old_value.borrow().clone()
    }

    /// Assign the scheduler tier deferred writes against this slot target.
    pub fn set_flush_priority(&self, priority: TaskPriority) {
        self.flush_priority.set(priority);
    }
}

impl PropertyAccessor for SetterObserver {
    fn get_value(&self) -> Value {
        self.value.borrow().clone()
    }

    fn set_value(&self, value: Value, flags: LifecycleFlags) {
        let old = self.value.replace(value.clone());
        *self.old_value.borrow_mut() = old.clone();
        self.subscribers.notify(&value, &old, flags);
    }
}

impl PropertyObserver for SetterObserver {
    fn subscribe(&self, subscriber: Rc<dyn Subscriber>) {
        self.subscribers.add(&subscriber);
    }

    fn unsubscribe(&self, subscriber: &Rc<dyn Subscriber>) {
        self.subscribers.remove(subscriber);
    }

    fn has_subscribers(&self) -> bool {
        self.subscribers.has_subscribers()
    }

    fn flush_priority(&self) -> TaskPriority {
        self.flush_priority.get()
    }
}

// =============================================================================
// TESTS
// =============================================================================
