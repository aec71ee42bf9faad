// ============================================================================
// weft - Expressions
// The opaque evaluation capability bindings drive, plus reference AST nodes
// ============================================================================
//
// The binding layer treats an expression as a capability exposing three
// operations: `evaluate` produces the current value against a scope,
// `connect` reports every property touched during evaluation to a
// connectable so it can subscribe, and `assign` writes a value back to the
// expression's source. Optional `bind`/`unbind` hooks let stateful
// expressions set up per-binding state.
// ============================================================================

use std::rc::Rc;

use crate::binding::scope::{Resolved, Scope};
use crate::core::flags::LifecycleFlags;
use crate::core::value::Value;
use crate::error::Result;
use crate::observation::locator::ObserverLocator;
use crate::observation::observed::ObservedObject;
use crate::observation::PropertyObserver;

/// The dependency-recording side of a binding: expressions report every
/// observer they touch during `connect` through this trait.
pub trait Connectable {
    fn observe(&self, observer: Rc<dyn PropertyObserver>);

    fn observe_property(
        &self,
        locator: &ObserverLocator,
        target: &Rc<ObservedObject>,
        name: &str,
    ) -> Result<()> {
        let observer = locator.get_observer(target, name)?;
        self.observe(observer);
        Ok(())
    }
}

/// An evaluatable source expression.
pub trait Expression {
    fn evaluate(&self, flags: LifecycleFlags, scope: &Scope) -> Result<Value>;

    /// Subscribe `binding` to every observable property this expression
    /// reads when evaluated against `scope`.
    fn connect(
        &self,
        flags: LifecycleFlags,
        scope: &Scope,
        binding: &dyn Connectable,
        locator: &ObserverLocator,
    ) -> Result<()>;

    /// Write `value` back to the expression's source. Not every expression
    /// is assignable; the default refuses by succeeding without effect.
    fn assign(
        &self,
        _flags: LifecycleFlags,
        _scope: &Scope,
        _locator: &ObserverLocator,
        _value: Value,
    ) -> Result<()> {
        Ok(())
    }

    fn has_bind(&self) -> bool {
        false
    }

    fn bind(&self, _flags: LifecycleFlags, _scope: &Scope) {}

    fn unbind(&self, _flags: LifecycleFlags, _scope: &Scope) {}
}

// =============================================================================
// ACCESS SCOPE
// =============================================================================

/// `name` resolved against the scope chain, optionally `ancestor` levels up.
pub struct AccessScope {
    name: Rc<str>,
    ancestor: usize,
}

impl AccessScope {
    pub fn new(name: &str) -> Rc<Self> {
        Self::ancestor(name, 0)
    }

    pub fn ancestor(name: &str, ancestor: usize) -> Rc<Self> {
        Rc::new(Self {
            name: Rc::from(name),
            ancestor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Expression for AccessScope {
    fn evaluate(&self, _flags: LifecycleFlags, scope: &Scope) -> Result<Value> {
        Ok(match scope.resolve(&self.name, self.ancestor) {
            Resolved::Object(obj) => obj.get(&self.name),
            Resolved::Transient(value) => value,
        })
    }

    fn connect(
        &self,
        _flags: LifecycleFlags,
        scope: &Scope,
        binding: &dyn Connectable,
        locator: &ObserverLocator,
    ) -> Result<()> {
        match scope.resolve(&self.name, self.ancestor) {
            Resolved::Object(obj) => binding.observe_property(locator, &obj, &self.name),
            // Transient injections exist for a single invocation only.
            Resolved::Transient(_) => Ok(()),
        }
    }

    fn assign(
        &self,
        flags: LifecycleFlags,
        scope: &Scope,
        locator: &ObserverLocator,
        value: Value,
    ) -> Result<()> {
        if let Resolved::Object(obj) = scope.resolve(&self.name, self.ancestor) {
            let accessor = locator.get_accessor(&obj, &self.name)?;
            accessor.set_value(value, flags);
        }
        Ok(())
    }
}

// =============================================================================
// ACCESS MEMBER
// =============================================================================

/// `object.name`: a property read off whatever the inner expression
/// evaluates to. Evaluating against a non-object yields null.
pub struct AccessMember {
    object: Rc<dyn Expression>,
    name: Rc<str>,
}

impl AccessMember {
    pub fn new(object: Rc<dyn Expression>, name: &str) -> Rc<Self> {
        Rc::new(Self {
            object,
            name: Rc::from(name),
        })
    }
}

impl Expression for AccessMember {
    fn evaluate(&self, flags: LifecycleFlags, scope: &Scope) -> Result<Value> {
        let base = self.object.evaluate(flags, scope)?;
        Ok(match base.as_object() {
            Some(obj) => obj.get(&self.name),
            None => Value::Null,
        })
    }

    fn connect(
        &self,
        flags: LifecycleFlags,
        scope: &Scope,
        binding: &dyn Connectable,
        locator: &ObserverLocator,
    ) -> Result<()> {
        self.object.connect(flags, scope, binding, locator)?;
        let base = self.object.evaluate(flags, scope)?;
        if let Some(obj) = base.as_object() {
            binding.observe_property(locator, obj, &self.name)?;
        }
        Ok(())
    }

    fn assign(
        &self,
        flags: LifecycleFlags,
        scope: &Scope,
        locator: &ObserverLocator,
        value: Value,
    ) -> Result<()> {
        let base = self.object.evaluate(flags, scope)?;
        if let Some(obj) = base.as_object() {
            let accessor = locator.get_accessor(obj, &self.name)?;
            accessor.set_value(value, flags);
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
