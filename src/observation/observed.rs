// ============================================================================
// weft - Observed Object
// The wrapper target: value slots indirected through an accessor table
// ============================================================================
//
// Instead of rewriting property descriptors on a live object, the observed
// object owns its slots outright. While a slot is uninstrumented, reads and
// writes hit the slot map directly; once an observer is installed for the
// slot, the observer holds the authoritative value and every read/write is
// routed through it. Sealed slots refuse instrumentation.
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use crate::core::flags::LifecycleFlags;
use crate::core::value::Value;
use crate::observation::{PropertyAccessor, PropertyObserver};

/// Definition of a computed slot: a getter plus the property names it reads.
/// An empty dependency list means "unknown" and sends the slot to the
/// dirty-check fallback when observed.
#[derive(Clone)]
pub(crate) struct ComputedDef {
    pub(crate) deps: Rc<[Rc<str>]>,
    pub(crate) getter: Rc<dyn Fn(&ObservedObject) -> Value>,
}

/// A dynamically shaped object whose properties can be observed.
pub struct ObservedObject {
    slots: RefCell<FxHashMap<Rc<str>, Value>>,
    sealed: RefCell<FxHashSet<Rc<str>>>,
    computed: RefCell<FxHashMap<Rc<str>, ComputedDef>>,
    /// Per-object observer table; at most one observer per slot for the
    /// lifetime of the object. Maintained by the observer locator.
    pub(crate) observers: RefCell<FxHashMap<Rc<str>, Rc<dyn PropertyObserver>>>,
}

impl ObservedObject {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(FxHashMap::default()),
            sealed: RefCell::new(FxHashSet::default()),
            computed: RefCell::new(FxHashMap::default()),
            observers: RefCell::new(FxHashMap::default()),
        })
    }

    /// Create an object pre-populated with plain data slots.
    pub fn with_properties<'a>(
        properties: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Rc<Self> {
        let obj = Self::new();
        for (name, value) in properties {
            obj.define(name, value);
        }
        obj
    }

    /// Define (or overwrite) a plain data slot without notifying anyone.
    /// Use [`set`](Self::set) for observable writes.
    pub fn define(&self, name: &str, value: impl Into<Value>) {
        self.slots.borrow_mut().insert(Rc::from(name), value.into());
    }

    /// Mark a slot non-configurable: it can no longer be instrumented for
    /// observation, and writes to it are refused.
    pub fn seal(&self, name: &str) {
        self.sealed.borrow_mut().insert(Rc::from(name));
    }

    pub fn is_sealed(&self, name: &str) -> bool {
        self.sealed.borrow().contains(name)
    }

    /// Define a computed slot with declared dependencies. Observing it
    /// subscribes to each dependency's observer.
    pub fn define_computed(
        &self,
        name: &str,
        deps: &[&str],
        getter: impl Fn(&ObservedObject) -> Value + 'static,
    ) {
        let deps: Rc<[Rc<str>]> = deps.iter().map(|d| Rc::from(*d)).collect();
        self.computed.borrow_mut().insert(
            Rc::from(name),
            ComputedDef {
                deps,
                getter: Rc::new(getter),
            },
        );
    }

    /// Define a computed slot with no declared dependencies. Observing it
    /// falls back to dirty-check polling.
    pub fn define_computed_polled(
        &self,
        name: &str,
        getter: impl Fn(&ObservedObject) -> Value + 'static,
    ) {
        self.define_computed(name, &[], getter);
    }

    pub fn has(&self, name: &str) -> bool {
        self.observers.borrow().contains_key(name)
            || self.slots.borrow().contains_key(name)
            || self.computed.borrow().contains_key(name)
    }

    /// Read a property. Routed through the slot's observer when one exists.
    pub fn get(&self, name: &str) -> Value {
        if let Some(observer) = self.observers.borrow().get(name) {
            return observer.get_value();
        }
        if let Some(def) = self.computed.borrow().get(name) {
            return (def.getter)(self);
        }
        self.slots.borrow().get(name).cloned().unwrap_or_default()
    }

    /// Write a property. Routed through the slot's observer when one
    /// exists, so every subscriber is notified regardless of which caller
    /// performed the write. Writes to sealed or computed slots are refused.
    pub fn set(&self, name: &str, value: impl Into<Value>, flags: LifecycleFlags) {
        let value = value.into();
        let observer = self.observers.borrow().get(name).cloned();
        if let Some(observer) = observer {
            observer.set_value(value, flags);
            return;
        }
        if self.computed.borrow().contains_key(name) {
            warn!(property = name, "ignoring write to computed slot");
            return;
        }
        if self.is_sealed(name) {
            warn!(property = name, "ignoring write to sealed slot");
            return;
        }
        self.slots.borrow_mut().insert(Rc::from(name), value);
    }

    pub(crate) fn computed_def(&self, name: &str) -> Option<ComputedDef> {
        self.computed.borrow().get(name).cloned()
    }

    pub(crate) fn observer_for(&self, name: &str) -> Option<Rc<dyn PropertyObserver>> {
        self.observers.borrow().get(name).cloned()
    }

    /// Move the current slot value out when an observer takes authority.
    pub(crate) fn take_slot(&self, name: &str) -> Value {
        self.slots.borrow_mut().remove(name).unwrap_or_default()
    }
}

impl fmt::Debug for ObservedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ObservedObject");
        s.field("slots", &self.slots.borrow().len());
        s.field("observers", &self.observers.borrow().len());
        s.finish()
    }
}

// =============================================================================
// BASIC ACCESSOR
// =============================================================================

/// The lighter-weight object returned by `ObserverLocator::get_accessor` for
/// write-only call sites. No subscription machinery; reads and writes still
/// route through the slot's observer when one exists.
pub struct BasicAccessor {
    target: Rc<ObservedObject>,
    key: Rc<str>,
}

impl BasicAccessor {
    pub(crate) fn new(target: Rc<ObservedObject>, key: Rc<str>) -> Self {
        Self { target, key }
    }
}

impl PropertyAccessor for BasicAccessor {
    fn get_value(&self) -> Value {
        self.target.get(&self.key)
    }

    fn set_value(&self, value: Value, flags: LifecycleFlags) {
        self.target.set(&self.key, value, flags);
    }
}

// =============================================================================
// TESTS
// =============================================================================
