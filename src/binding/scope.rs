// ============================================================================
// weft - Scope
// Binding context plus a parent-linked override chain for ancestor lookup
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::core::value::Value;
use crate::observation::observed::ObservedObject;

/// One link in the override chain. Carries its own binding context, an
/// optional parent, and the transient injected properties (`$event`-style)
/// that exist only for the duration of a single callback invocation.
#[derive(Debug)]
pub struct OverrideContext {
    binding_context: Rc<ObservedObject>,
    parent: Option<Rc<OverrideContext>>,
    transient: RefCell<FxHashMap<Rc<str>, Value>>,
}

impl OverrideContext {
    pub fn new(binding_context: Rc<ObservedObject>, parent: Option<Rc<OverrideContext>>) -> Rc<Self> {
        Rc::new(Self {
            binding_context,
            parent,
            transient: RefCell::new(FxHashMap::default()),
        })
    }

    pub fn binding_context(&self) -> &Rc<ObservedObject> {
        &self.binding_context
    }

    pub fn parent(&self) -> Option<&Rc<OverrideContext>> {
        self.parent.as_ref()
    }

    fn transient_value(&self, name: &str) -> Option<Value> {
        self.transient.borrow().get(name).cloned()
    }
}

/// What a name resolved to.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// The name is (or may become) a property of this binding context.
    Object(Rc<ObservedObject>),
    /// The name is a transient injected property. Not observable.
    Transient(Value),
}

/// The immutable-shape pair every binding is bound against. Created once per
/// component activation and discarded on deactivation.
#[derive(Clone, Debug)]
pub struct Scope {
    binding_context: Rc<ObservedObject>,
    override_context: Rc<OverrideContext>,
}

impl Scope {
    /// A root scope with no ancestors.
    pub fn new(binding_context: Rc<ObservedObject>) -> Self {
        let override_context = OverrideContext::new(binding_context.clone(), None);
        Self {
            binding_context,
            override_context,
        }
    }

    /// A child scope whose override chain continues into `parent`.
    pub fn nested(binding_context: Rc<ObservedObject>, parent: &Scope) -> Self {
        let override_context =
            OverrideContext::new(binding_context.clone(), Some(parent.override_context.clone()));
        Self {
            binding_context,
            override_context,
        }
    }

    pub fn binding_context(&self) -> &Rc<ObservedObject> {
        &self.binding_context
    }

    pub fn override_context(&self) -> &Rc<OverrideContext> {
        &self.override_context
    }

    /// Resolve `name` to the context that holds it.
    ///
    /// `ancestor > 0` skips resolution and returns the binding context that
    /// many levels up (clamped to the root). Otherwise the chain is walked
    /// from the current context outward, preferring transient injected
    /// properties, until a context has the name; a miss resolves to the
    /// current binding context so new properties land there.
    pub fn resolve(&self, name: &str, ancestor: usize) -> Resolved {
        if ancestor > 0 {
            let mut context = &self.override_context;
            for _ in 0..ancestor {
                match context.parent() {
                    Some(parent) => context = parent,
                    None => break,
                }
            }
            return Resolved::Object(context.binding_context().clone());
        }

        let mut context = Some(&self.override_context);
        while let Some(current) = context {
            if let Some(value) = current.transient_value(name) {
                return Resolved::Transient(value);
            }
            if current.binding_context().has(name) {
                return Resolved::Object(current.binding_context().clone());
            }
            context = current.parent();
        }
        Resolved::Object(self.binding_context.clone())
    }

    /// Inject a transient property for the duration of `f`, then remove it.
    pub fn with_transient<R>(&self, name: &str, value: Value, f: impl FnOnce(&Scope) -> R) -> R {
        let key: Rc<str> = Rc::from(name);
        self.override_context
            .transient
            .borrow_mut()
            .insert(key.clone(), value);
        let result = f(self);
        self.override_context.transient.borrow_mut().remove(&key);
        result
    }
}

// =============================================================================
// TESTS
// =============================================================================
