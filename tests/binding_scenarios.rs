use std::cell::Cell;
use std::rc::Rc;

use weft::{
    AccessMember, AccessScope, BindingMode, Connectable, Expression, LifecycleFlags,
    ObservedObject, ObserverLocator, PropertyBinding, Result, Scheduler, Scope, Subscriber, Value,
    VirtualPlatform,
};

fn locator() -> Rc<ObserverLocator> {
    ObserverLocator::new(Scheduler::new(Rc::new(VirtualPlatform::new())))
}

struct CallCounter {
    calls: Cell<usize>,
}

impl CallCounter {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            calls: Cell::new(0),
        })
    }
}

impl Subscriber for CallCounter {
    fn handle_change(&self, _: &Value, _: &Value, _: LifecycleFlags) {
        self.calls.set(self.calls.get() + 1);
    }
}

#[test]
fn live_set_follows_the_most_recent_evaluation() {
    let locator = locator();

    let ada = ObservedObject::new();
    ada.define("name", "ada");
    let grace = ObservedObject::new();
    grace.define("name", "grace");

    let root = ObservedObject::new();
    root.define("user", ada.clone());
    let scope = Scope::new(root.clone());

    let target = ObservedObject::new();
    let binding = PropertyBinding::new(
        AccessMember::new(AccessScope::new("user"), "name"),
        target.clone(),
        "text",
        BindingMode::ToView,
        locator.clone(),
        None,
    );
    binding.bind(LifecycleFlags::empty(), scope).unwrap();

    // Touched set: {user, ada.name}.
    assert_eq!(target.get("text"), Value::from("ada"));
    assert_eq!(binding.observer_count(), 2);

    // Swapping the user re-walks the expression; the stale ada.name
    // subscription must be pruned and grace.name picked up.
    root.set("user", grace.clone(), LifecycleFlags::empty());
    assert_eq!(target.get("text"), Value::from("grace"));
    assert_eq!(binding.observer_count(), 2);

    let ada_name = locator.get_observer(&ada, "name").unwrap();
    assert!(!ada_name.has_subscribers());
    let grace_name = locator.get_observer(&grace, "name").unwrap();
    assert!(grace_name.has_subscribers());

    // The stale dependency is really dead: writing it changes nothing.
    ada.set("name", "augusta", LifecycleFlags::empty());
    assert_eq!(target.get("text"), Value::from("grace"));

    // The live one propagates.
    grace.set("name", "hopper", LifecycleFlags::empty());
    assert_eq!(target.get("text"), Value::from("hopper"));
}

/// A branching expression: reads `flag`, then only one of `a`/`b`.
struct Pick {
    flag: Rc<AccessScope>,
    left: Rc<AccessScope>,
    right: Rc<AccessScope>,
}

impl Pick {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            flag: AccessScope::new("flag"),
            left: AccessScope::new("a"),
            right: AccessScope::new("b"),
        })
    }

    fn branch(&self, flags: LifecycleFlags, scope: &Scope) -> Result<&AccessScope> {
        Ok(match self.flag.evaluate(flags, scope)? {
            Value::Bool(true) => &self.left,
            _ => &self.right,
        })
    }
}

impl Expression for Pick {
    fn evaluate(&self, flags: LifecycleFlags, scope: &Scope) -> Result<Value> {
        self.branch(flags, scope)?.evaluate(flags, scope)
    }

    fn connect(
        &self,
        flags: LifecycleFlags,
        scope: &Scope,
        binding: &dyn Connectable,
        locator: &ObserverLocator,
    ) -> Result<()> {
        self.flag.connect(flags, scope, binding, locator)?;
        self.branch(flags, scope)?.connect(flags, scope, binding, locator)
    }
}

#[test]
fn switching_branches_prunes_the_untaken_branch() {
    let locator = locator();

    let source = ObservedObject::new();
    source.define("flag", true);
    source.define("a", "left");
    source.define("b", "right");
    let scope = Scope::new(source.clone());

    let target = ObservedObject::new();
    let binding = PropertyBinding::new(
        Pick::new(),
        target.clone(),
        "text",
        BindingMode::ToView,
        locator.clone(),
        None,
    );
    binding.bind(LifecycleFlags::empty(), scope).unwrap();

    assert_eq!(target.get("text"), Value::from("left"));
    assert_eq!(binding.observer_count(), 2);
    assert!(locator.get_observer(&source, "a").unwrap().has_subscribers());

    source.set("flag", false, LifecycleFlags::empty());
    assert_eq!(target.get("text"), Value::from("right"));
    assert_eq!(binding.observer_count(), 2);
    assert!(!locator.get_observer(&source, "a").unwrap().has_subscribers());
    assert!(locator.get_observer(&source, "b").unwrap().has_subscribers());

    // The abandoned branch no longer drives evaluation.
    source.set("a", "stale", LifecycleFlags::empty());
    assert_eq!(target.get("text"), Value::from("right"));
}

#[test]
fn observers_never_suppress_equal_values_but_bindings_do() {
    let locator = locator();

    let source = ObservedObject::new();
    source.define("x", "v");
    let scope = Scope::new(source.clone());

    // Raw observer level: setting the same value still notifies.
    let raw = locator.get_observer(&source, "x").unwrap();
    let raw_counter = CallCounter::new();
    raw.subscribe(raw_counter.clone());
    source.set("x", "v", LifecycleFlags::empty());
    source.set("x", "v", LifecycleFlags::empty());
    assert_eq!(raw_counter.calls.get(), 2);

    // Binding level: the target only sees actual changes.
    let target = ObservedObject::new();
    let binding = PropertyBinding::new(
        AccessScope::new("x"),
        target.clone(),
        "text",
        BindingMode::ToView,
        locator.clone(),
        None,
    );
    binding.bind(LifecycleFlags::empty(), scope).unwrap();

    let target_observer = locator.get_observer(&target, "text").unwrap();
    let target_counter = CallCounter::new();
    target_observer.subscribe(target_counter.clone());

    source.set("x", "v", LifecycleFlags::empty());
    assert_eq!(target_counter.calls.get(), 0);
    source.set("x", "w", LifecycleFlags::empty());
    assert_eq!(target_counter.calls.get(), 1);
}

#[test]
fn sibling_bindings_observing_the_same_target_stay_consistent() {
    let locator = locator();

    let source = ObservedObject::new();
    source.define("value", 1i64);
    let scope = Scope::new(source.clone());

    let target = ObservedObject::new();
    target.define("shared", 0i64);

    // One binding writes the target, another mirrors it back out.
    let writer = PropertyBinding::new(
        AccessScope::new("value"),
        target.clone(),
        "shared",
        BindingMode::ToView,
        locator.clone(),
        None,
    );
    let mirror_obj = ObservedObject::new();
    mirror_obj.define("copy", 0i64);
    let mirror = PropertyBinding::new(
        AccessScope::new("copy"),
        target.clone(),
        "shared",
        BindingMode::FromView,
        locator.clone(),
        None,
    );

    mirror
        .bind(LifecycleFlags::empty(), Scope::new(mirror_obj.clone()))
        .unwrap();
    writer.bind(LifecycleFlags::empty(), scope).unwrap();
    assert_eq!(mirror_obj.get("copy"), Value::from(1i64));

    // The writer routes through the target's observer, so the mirror sees
    // every change regardless of which binding performed the write.
    source.set("value", 7i64, LifecycleFlags::empty());
    assert_eq!(target.get("shared"), Value::from(7i64));
    assert_eq!(mirror_obj.get("copy"), Value::from(7i64));
}

#[test]
fn rebinding_against_a_new_scope_replaces_the_dependency_set() {
    let locator = locator();

    let first = ObservedObject::new();
    first.define("msg", "one");
    let second = ObservedObject::new();
    second.define("msg", "two");

    let target = ObservedObject::new();
    let binding = PropertyBinding::new(
        AccessScope::new("msg"),
        target.clone(),
        "text",
        BindingMode::ToView,
        locator.clone(),
        None,
    );

    binding
        .bind(LifecycleFlags::empty(), Scope::new(first.clone()))
        .unwrap();
    assert_eq!(target.get("text"), Value::from("one"));

    binding
        .bind(LifecycleFlags::empty(), Scope::new(second.clone()))
        .unwrap();
    assert_eq!(target.get("text"), Value::from("two"));

    // Only the new scope's observer is live.
    assert!(!locator.get_observer(&first, "msg").unwrap().has_subscribers());
    first.set("msg", "stale", LifecycleFlags::empty());
    assert_eq!(target.get("text"), Value::from("two"));
    second.set("msg", "fresh", LifecycleFlags::empty());
    assert_eq!(target.get("text"), Value::from("fresh"));
}
