// ============================================================================
// weft - Observer Locator
// Route (target, property) pairs to the right observer implementation
// ============================================================================
//
// The locator owns the creation policy: plain slots get a SetterObserver
// (which takes authority over the value), computed slots with declared
// dependencies get a ComputedObserver subscribed to each dependency, and
// computed slots without declared dependencies fall back to the dirty
// checker. Sealed slots fail loudly instead of being silently dirty-checked.
//
// The per-target observer table guarantees at most one observer instance per
// (object, property): the new observer is installed in the table before any
// wiring happens, so a reentrant get_observer from within a notification
// callback returns the under-construction instance instead of a duplicate.
// ============================================================================

use std::rc::Rc;

use tracing::debug;

use crate::collections::{CollectionObserver, ObservedArray, ObservedMap, ObservedSet};
use crate::error::{Error, Result};
use crate::observation::computed::ComputedObserver;
use crate::observation::dirty_check::DirtyChecker;
use crate::observation::observed::{BasicAccessor, ObservedObject};
use crate::observation::property::SetterObserver;
use crate::observation::subscriber::Subscriber;
use crate::observation::{PropertyAccessor, PropertyObserver};
use crate::scheduler::Scheduler;

pub struct ObserverLocator {
    dirty_checker: Rc<DirtyChecker>,
}

impl ObserverLocator {
    pub fn new(scheduler: Rc<Scheduler>) -> Rc<Self> {
        Rc::new(Self {
            dirty_checker: DirtyChecker::new(scheduler),
        })
    }

    pub fn dirty_checker(&self) -> &Rc<DirtyChecker> {
        &self.dirty_checker
    }

    /// Cancel background polling.
    pub fn dispose(&self) {
        self.dirty_checker.stop();
    }

    /// Return the observer for `(target, name)`, creating it on first
    /// request. Two calls return the same instance for the lifetime of the
    /// target.
    pub fn get_observer(
        &self,
        target: &Rc<ObservedObject>,
        name: &str,
    ) -> Result<Rc<dyn PropertyObserver>> {
        if let Some(existing) = target.observer_for(name) {
            return Ok(existing);
        }
        if target.is_sealed(name) {
            return Err(Error::NonConfigurable {
                property: name.to_owned(),
            });
        }

        let key: Rc<str> = Rc::from(name);

        if let Some(def) = target.computed_def(name) {
            let computed = ComputedObserver::new(key.clone(), target, def.getter.clone());
            // Install before wiring so reentrant lookups see this instance.
            target
                .observers
                .borrow_mut()
                .insert(key.clone(), computed.clone());

            if def.deps.is_empty() {
                debug!(property = name, "computed slot has no declared deps; dirty-checking");
                // The entry itself is added with the first subscriber and
                // removed with the last, so polling only runs while someone
                // is watching.
                computed.set_dirty_checker(&self.dirty_checker);
            } else if let Err(err) = self.wire_dependencies(target, &computed, &def.deps) {
                target.observers.borrow_mut().remove(&*key);
                return Err(err);
            }
            return Ok(computed);
        }

        // Plain data slot: the observer takes authority over the value.
        let initial = target.take_slot(name);
        let observer = SetterObserver::new(key.clone(), initial);
        target.observers.borrow_mut().insert(key, observer.clone());
        debug!(property = name, "instrumented plain slot");
        Ok(observer)
    }

    fn wire_dependencies(
        &self,
        target: &Rc<ObservedObject>,
        computed: &Rc<ComputedObserver>,
        deps: &[Rc<str>],
    ) -> Result<()> {
        for dep in deps {
            let dep_observer = self.get_observer(target, dep)?;
            dep_observer.subscribe(computed.clone() as Rc<dyn Subscriber>);
            computed.attach_dependency(dep_observer);
        }
        Ok(())
    }

    /// The lighter-weight contract for write-only call sites: no
    /// subscription, but writes still route through the slot's observer
    /// when one exists.
    pub fn get_accessor(
        &self,
        target: &Rc<ObservedObject>,
        name: &str,
    ) -> Result<Rc<dyn PropertyAccessor>> {
        if target.is_sealed(name) {
            return Err(Error::NonConfigurable {
                property: name.to_owned(),
            });
        }
        Ok(Rc::new(BasicAccessor::new(target.clone(), Rc::from(name))))
    }

    /// The batched-patch observer for an ordered sequence. At most one per
    /// collection; the instance is attached to the collection itself.
    pub fn get_array_observer<T: 'static>(
        &self,
        array: &ObservedArray<T>,
    ) -> Rc<CollectionObserver> {
        array.observer()
    }

    pub fn get_map_observer<K, V>(&self, map: &ObservedMap<K, V>) -> Rc<CollectionObserver>
    where
        K: Eq + std::hash::Hash + 'static,
        V: 'static,
    {
        map.observer()
    }

    pub fn get_set_observer<T>(&self, set: &ObservedSet<T>) -> Rc<CollectionObserver>
    where
        T: Eq + std::hash::Hash + 'static,
    {
        set.observer()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flags::LifecycleFlags;
    use crate::core::platform::VirtualPlatform;
    use crate::core::value::Value;
    use std::cell::{Cell, RefCell};

    fn locator() -> Rc<ObserverLocator> {
        ObserverLocator::new(Scheduler::new(Rc::new(VirtualPlatform::new())))
    }

    struct Recorder {
        calls: Cell<usize>,
    }

    impl Recorder {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                calls: Cell::new(0),
            })
        }
    }

    impl Subscriber for Recorder {
        fn handle_change(&self, _: &Value, _: &Value, _: LifecycleFlags) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    #[test]
    fn same_instance_for_repeated_lookups() {
        let locator = locator();
        let obj = ObservedObject::new();
        obj.define("count", 1i64);

        let a = locator.get_observer(&obj, "count").unwrap();
        let b = locator.get_observer(&obj, "count").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn sealed_property_fails_instead_of_dirty_checking() {
        let locator = locator();
        let obj = ObservedObject::new();
        obj.define("fixed", 1i64);
        obj.seal("fixed");

        let err = locator.get_observer(&obj, "fixed").err().unwrap();
        assert!(matches!(err, Error::NonConfigurable { .. }));
        let err = locator.get_accessor(&obj, "fixed").err().unwrap();
        assert!(matches!(err, Error::NonConfigurable { .. }));
    }

    #[test]
    fn observer_takes_authority_over_the_slot() {
        let locator = locator();
        let obj = ObservedObject::new();
        obj.define("name", "ada");

        let observer = locator.get_observer(&obj, "name").unwrap();
        assert_eq!(observer.get_value(), Value::from("ada"));

        // Writes through the object route through the observer...
        let recorder = Recorder::new();
        observer.subscribe(recorder.clone() as Rc<dyn Subscriber>);
        obj.set("name", "grace", LifecycleFlags::empty());
        assert_eq!(recorder.calls.get(), 1);

        // ...and so do writes through an accessor.
        let accessor = locator.get_accessor(&obj, "name").unwrap();
        accessor.set_value(Value::from("katherine"), LifecycleFlags::empty());
        assert_eq!(recorder.calls.get(), 2);
        assert_eq!(obj.get("name"), Value::from("katherine"));
    }

    #[test]
    fn computed_with_declared_deps_reacts_to_dependency_writes() {
        let locator = locator();
        let obj = ObservedObject::new();
        obj.define("first", "ada");
        obj.define("last", "lovelace");
        obj.define_computed("full", &["first", "last"], |o| {
            Value::from(format!("{} {}", o.get("first"), o.get("last")))
        });

        let observer = locator.get_observer(&obj, "full").unwrap();
        let recorder = Recorder::new();
        observer.subscribe(recorder.clone() as Rc<dyn Subscriber>);

        obj.set("first", "augusta", LifecycleFlags::empty());
        assert_eq!(recorder.calls.get(), 1);
        assert_eq!(obj.get("full"), Value::from("augusta lovelace"));
    }

    #[test]
    fn polled_entries_track_subscriber_lifetime() {
        let locator = locator();
        let obj = ObservedObject::new();
        obj.define("raw", 1i64);
        obj.define_computed_polled("snapshot", |o| o.get("raw"));

        // No subscribers yet, so nothing is polled.
        let observer = locator.get_observer(&obj, "snapshot").unwrap();
        assert_eq!(locator.dirty_checker().entry_count(), 0);

        let recorder = Recorder::new();
        observer.subscribe(recorder.clone() as Rc<dyn Subscriber>);
        assert_eq!(locator.dirty_checker().entry_count(), 1);

        // The last subscriber leaving removes the entry again.
        let subscriber: Rc<dyn Subscriber> = recorder;
        observer.unsubscribe(&subscriber);
        assert_eq!(locator.dirty_checker().entry_count(), 0);
        locator.dispose();
    }

    #[test]
    fn reentrant_lookup_during_notification_returns_same_instance() {
        struct ReentrantSubscriber {
            locator: Rc<ObserverLocator>,
            target: Rc<ObservedObject>,
            seen: RefCell<Option<Rc<dyn PropertyObserver>>>,
        }

        impl Subscriber for ReentrantSubscriber {
            fn handle_change(&self, _: &Value, _: &Value, _: LifecycleFlags) {
                let again = self.locator.get_observer(&self.target, "count").unwrap();
                *self.seen.borrow_mut() = Some(again);
            }
        }

        let locator = locator();
        let obj = ObservedObject::new();
        obj.define("count", 0i64);

        let observer = locator.get_observer(&obj, "count").unwrap();
        let reentrant = Rc::new(ReentrantSubscriber {
            locator: locator.clone(),
            target: obj.clone(),
            seen: RefCell::new(None),
        });
        observer.subscribe(reentrant.clone() as Rc<dyn Subscriber>);

        obj.set("count", 1i64, LifecycleFlags::empty());
        let seen = reentrant.seen.borrow().clone().unwrap();
        assert!(Rc::ptr_eq(&seen, &observer));
    }
}
