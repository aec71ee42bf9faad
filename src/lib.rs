// ============================================================================
// weft - A Reactive Binding Core
// ============================================================================
//
// The dependency-tracking observation engine and priority-based task
// scheduler of a component-based UI framework, without any DOM: property
// observers and the locator that hands them out, connectable bindings with
// versioned dependency sets, depth-counted lifecycle queues ordering
// bind/attach/mount transitions, and a five-tier scheduler driven through a
// host-supplied request/cancel flush contract. The same core runs identically
// under any host event loop, including the headless `VirtualPlatform` used
// throughout the tests.
// ============================================================================

pub mod binding;
pub mod collections;
pub mod core;
pub mod error;
pub mod lifecycle;
pub mod observation;
pub mod scheduler;

// Re-export the shared primitives at crate root for ergonomic access
pub use crate::core::flags::{BindingMode, LifecycleFlags, QueueFlags};
pub use crate::core::platform::{HostPlatform, VirtualPlatform};
pub use crate::core::runtime::Runtime;
pub use crate::core::value::Value;
pub use error::{Error, Result};

// Observation layer
pub use observation::{
    BasicAccessor, CollectionChange, CollectionSubscriber, ComputedObserver, DirtyChecker,
    ObservedObject, ObserverLocator, PropertyAccessor, PropertyObserver, SetterObserver,
    Subscriber, SubscriberCollection,
};

// Collections
pub use collections::{CollectionObserver, ObservedArray, ObservedMap, ObservedSet};

// Binding layer
pub use binding::{
    AccessMember, AccessScope, Connectable, Expression, OverrideContext, PropertyBinding,
    Resolved, Scope,
};

// Lifecycle queues
pub use lifecycle::{BatchItem, Controller, Lifecycle, LifecycleState};

// Task scheduler
pub use scheduler::{
    QueueTaskOptions, Scheduler, Task, TaskHandle, TaskPriority, TaskQueue, TaskStatus,
};
