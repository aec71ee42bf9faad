// ============================================================================
// weft - Property Binding
// Versioned dependency tracking between a source expression and a target slot
// ============================================================================
//
// The central algorithm is "unobserve stale, keep live": every re-evaluation
// bumps the binding's dependency version, stamps each observer touched
// during the walk with the new version, and afterwards unsubscribes only the
// observers whose stamp is older. Nothing is torn down and rebuilt, so
// observers shared between consecutive evaluations keep one stable
// subscription.
//
// Target writes always go through the target's accessor/observer, never
// straight into the slot, so sibling bindings observing the same target
// property stay consistent no matter which binding wrote it.
//
// Observer callbacks are infallible, so failures inside them (evaluation
// errors, unknown mode/flag combinations) are fatal programming errors and
// panic with the formatted crate error.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::binding::expression::{Connectable, Expression};
use crate::binding::scope::Scope;
use crate::core::flags::{BindingMode, LifecycleFlags};
use crate::core::value::Value;
use crate::error::{Error, Result};
use crate::observation::locator::ObserverLocator;
use crate::observation::observed::ObservedObject;
use crate::observation::subscriber::Subscriber;
use crate::observation::{PropertyAccessor, PropertyObserver};
use crate::scheduler::{QueueTaskOptions, Scheduler, TaskHandle, TaskPriority, TaskStatus};

/// Binding state machine. The transient states exist so reentrant
/// notifications triggered mid-transition can tell they should not flush.
#[derive(Debug)]
enum BindingState {
    Unbound,
    Binding,
    Bound(Scope),
    Unbinding,
}

/// One tracked dependency: the observer plus the dependency version it was
/// last touched at.
struct ObserverSlot {
    observer: Rc<dyn PropertyObserver>,
    version: Cell<u64>,
}

/// Connects a source expression to one property of a target object, in the
/// direction(s) given by its [`BindingMode`].
pub struct PropertyBinding {
    source_expression: Rc<dyn Expression>,
    target: Rc<ObservedObject>,
    target_property: Rc<str>,
    mode: BindingMode,
    locator: Rc<ObserverLocator>,
    /// Without a scheduler every source change flushes synchronously.
    scheduler: Option<Rc<Scheduler>>,
    state: RefCell<BindingState>,
    version: Cell<u64>,
    slots: RefCell<Vec<ObserverSlot>>,
    target_accessor: RefCell<Option<Rc<dyn PropertyAccessor>>>,
    target_observer: RefCell<Option<Rc<dyn PropertyObserver>>>,
    target_subscriber: RefCell<Option<Rc<TargetSubscriber>>>,
    pending_flush: RefCell<Option<TaskHandle>>,
    weak_self: Weak<PropertyBinding>,
}

impl PropertyBinding {
    pub fn new(
        source_expression: Rc<dyn Expression>,
        target: Rc<ObservedObject>,
        target_property: &str,
        mode: BindingMode,
        locator: Rc<ObserverLocator>,
        scheduler: Option<Rc<Scheduler>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            source_expression,
            target,
            target_property: Rc::from(target_property),
            mode,
            locator,
            scheduler,
            state: RefCell::new(BindingState::Unbound),
            version: Cell::new(0),
            slots: RefCell::new(Vec::new()),
            target_accessor: RefCell::new(None),
            target_observer: RefCell::new(None),
            target_subscriber: RefCell::new(None),
            pending_flush: RefCell::new(None),
            weak_self: weak_self.clone(),
        })
    }

    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    pub fn is_bound(&self) -> bool {
        matches!(*self.state.borrow(), BindingState::Bound(_))
    }

    /// Live dependency count: the observers the most recent evaluation
    /// touched.
    pub fn observer_count(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Bind against `scope`: seed the target (unless write-only), connect to
    /// every observer the source expression touches, and for target-observing
    /// modes subscribe to the target property as well. Binding an already
    /// bound binding rebinds it against the new scope.
    pub fn bind(&self, flags: LifecycleFlags, scope: Scope) -> Result<()> {
        if self.is_bound() {
            self.unbind(flags);
        }
        *self.state.borrow_mut() = BindingState::Binding;
        let flags = flags | LifecycleFlags::FROM_BIND;

        if self.source_expression.has_bind() {
            self.source_expression.bind(flags, &scope);
        }

        if self.mode.updates_target() {
            let accessor = self
                .locator
                .get_accessor(&self.target, &self.target_property)?;
            let value = self.source_expression.evaluate(flags, &scope)?;
            accessor.set_value(value, flags | LifecycleFlags::UPDATE_TARGET);
            *self.target_accessor.borrow_mut() = Some(accessor);
        }

        if self.mode.observes_source() {
            self.version.set(self.version.get() + 1);
            self.source_expression
                .connect(flags, &scope, self, &self.locator)?;
        }

        if self.mode.observes_target() {
            let observer = self
                .locator
                .get_observer(&self.target, &self.target_property)?;
            let subscriber = Rc::new(TargetSubscriber {
                binding: self.weak_self.clone(),
            });
            observer.subscribe(subscriber.clone());
            *self.target_observer.borrow_mut() = Some(observer);
            *self.target_subscriber.borrow_mut() = Some(subscriber);
        }

        *self.state.borrow_mut() = BindingState::Bound(scope);
        Ok(())
    }

    /// Release every still-held subscription and cancel any queued flush.
    pub fn unbind(&self, flags: LifecycleFlags) {
        if !self.is_bound() {
            return;
        }
        let scope = match std::mem::replace(&mut *self.state.borrow_mut(), BindingState::Unbinding)
        {
            BindingState::Bound(scope) => scope,
            _ => unreachable!(),
        };
        let flags = flags | LifecycleFlags::FROM_UNBIND;

        if self.source_expression.has_bind() {
            self.source_expression.unbind(flags, &scope);
        }

        let this = self.as_subscriber();
        for slot in self.slots.borrow_mut().drain(..) {
            if let Some(this) = &this {
                slot.observer.unsubscribe(this);
            }
        }

        if let Some(observer) = self.target_observer.borrow_mut().take() {
            if let Some(subscriber) = self.target_subscriber.borrow_mut().take() {
                let subscriber: Rc<dyn Subscriber> = subscriber;
                observer.unsubscribe(&subscriber);
            }
        }
        self.target_accessor.borrow_mut().take();

        if let Some(task) = self.pending_flush.borrow_mut().take() {
            task.cancel();
        }

        *self.state.borrow_mut() = BindingState::Unbound;
    }

    fn as_subscriber(&self) -> Option<Rc<dyn Subscriber>> {
        self.weak_self
            .upgrade()
            .map(|rc| rc as Rc<dyn Subscriber>)
    }

    fn bound_scope(&self) -> Option<Scope> {
        match &*self.state.borrow() {
            BindingState::Bound(scope) => Some(scope.clone()),
            _ => None,
        }
    }

    /// Dispatch a change by direction. Exactly one of `UPDATE_TARGET` /
    /// `UPDATE_SOURCE` must be set, and it must agree with the binding mode.
    fn handle(&self, flags: LifecycleFlags) {
        if !self.is_bound() {
            return;
        }
        let toward_target = flags.contains(LifecycleFlags::UPDATE_TARGET);
        let toward_source = flags.contains(LifecycleFlags::UPDATE_SOURCE);

        if toward_target && !toward_source && self.mode.updates_target() {
            let synchronous = self.scheduler.is_none()
                || flags
                    .intersects(LifecycleFlags::FROM_BIND | LifecycleFlags::FROM_FLUSH);
            if synchronous {
                self.flush_source_change(flags);
            } else {
                self.schedule_flush(flags);
            }
        } else if toward_source && !toward_target && self.mode.observes_target() {
            self.flush_target_change(flags);
        } else {
            panic!(
                "{}",
                Error::UnknownMode {
                    mode: self.mode,
                    flags,
                }
            );
        }
    }

    /// Defer the target update to the scheduler. Repeated source changes
    /// before the flush runs coalesce into the one already-pending task.
    fn schedule_flush(&self, flags: LifecycleFlags) {
        let mut pending = self.pending_flush.borrow_mut();
        if pending
            .as_ref()
            .is_some_and(|task| task.status() == TaskStatus::Pending)
        {
            return;
        }

        let scheduler = self.scheduler.as_ref().unwrap_or_else(|| unreachable!());
        let priority = self
            .target_observer
            .borrow()
            .as_ref()
            .map(|o| o.flush_priority())
            .unwrap_or(TaskPriority::Render);

        let weak = self.weak_self.clone();
        let task_flags = flags | LifecycleFlags::FROM_FLUSH;
        let handle = scheduler.queue_task(
            move || {
                if let Some(binding) = weak.upgrade() {
                    binding.flush_source_change(task_flags);
                }
            },
            QueueTaskOptions {
                priority,
                reusable: true,
                ..Default::default()
            },
        );
        *pending = Some(handle);
    }

    /// Re-evaluate the source, rebuild the dependency set, and write the
    /// result to the target when it actually changed.
    fn flush_source_change(&self, flags: LifecycleFlags) {
        let Some(scope) = self.bound_scope() else {
            return;
        };

        let value = self
            .source_expression
            .evaluate(flags, &scope)
            .unwrap_or_else(|err| panic!("{err}"));

        if self.mode.observes_source() {
            self.version.set(self.version.get() + 1);
            self.source_expression
                .connect(flags, &scope, self, &self.locator)
                .unwrap_or_else(|err| panic!("{err}"));
            self.unobserve_stale();
        }

        let accessor = self.target_accessor.borrow().clone();
        if let Some(accessor) = accessor {
            // The observer layer never suppresses equal values; the binding
            // layer does, which also breaks two-way echo loops.
            if accessor.get_value() != value {
                accessor.set_value(value, flags | LifecycleFlags::UPDATE_TARGET);
            }
        }
    }

    /// Write a target change back to the source expression.
    fn flush_target_change(&self, flags: LifecycleFlags) {
        let Some(scope) = self.bound_scope() else {
            return;
        };
        let Some(observer) = self.target_observer.borrow().clone() else {
            return;
        };
        let value = observer.get_value();

        let current = self
            .source_expression
            .evaluate(flags, &scope)
            .unwrap_or_else(|err| panic!("{err}"));
        if current == value {
            return;
        }
        self.source_expression
            .assign(flags | LifecycleFlags::UPDATE_SOURCE, &scope, &self.locator, value)
            .unwrap_or_else(|err| panic!("{err}"));
    }

    /// Unsubscribe every observer whose stamp is older than the current
    /// dependency version.
    fn unobserve_stale(&self) {
        let version = self.version.get();
        let this = self.as_subscriber();
        self.slots.borrow_mut().retain(|slot| {
            if slot.version.get() == version {
                return true;
            }
            trace!(property = &*self.target_property, "pruning stale dependency");
            if let Some(this) = &this {
                slot.observer.unsubscribe(this);
            }
            false
        });
    }
}

impl Connectable for PropertyBinding {
    /// Record a dependency touched by the current evaluation. An observer
    /// already tracked only gets its version stamp refreshed; a new one is
    /// subscribed exactly once.
    fn observe(&self, observer: Rc<dyn PropertyObserver>) {
        let version = self.version.get();
        let mut slots = self.slots.borrow_mut();
        if let Some(slot) = slots
            .iter()
            .find(|slot| Rc::ptr_eq(&slot.observer, &observer))
        {
            slot.version.set(version);
            return;
        }
        if let Some(this) = self.as_subscriber() {
            observer.subscribe(this);
        }
        slots.push(ObserverSlot {
            observer,
            version: Cell::new(version),
        });
    }
}

impl Subscriber for PropertyBinding {
    /// A source dependency changed.
    fn handle_change(&self, _new_value: &Value, _old_value: &Value, flags: LifecycleFlags) {
        self.handle((flags - LifecycleFlags::UPDATE_SOURCE) | LifecycleFlags::UPDATE_TARGET);
    }
}

/// Adapter distinguishing target-observer callbacks from source-observer
/// callbacks, which both land on the same binding. Echo loops (a binding
/// reacting to its own target write) die on the value comparison in
/// `flush_target_change`, not here, so writes performed by sibling bindings
/// still flow back to this binding's source.
struct TargetSubscriber {
    binding: Weak<PropertyBinding>,
}

impl Subscriber for TargetSubscriber {
    fn handle_change(&self, _new_value: &Value, _old_value: &Value, flags: LifecycleFlags) {
        if let Some(binding) = self.binding.upgrade() {
            binding.handle((flags - LifecycleFlags::UPDATE_TARGET) | LifecycleFlags::UPDATE_SOURCE);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
