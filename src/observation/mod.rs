// ============================================================================
// weft - Observation
// Property observers, the observed-object wrapper, and the observer locator
// ============================================================================

pub mod computed;
pub mod dirty_check;
pub mod locator;
pub mod observed;
pub mod property;
pub mod subscriber;

use std::rc::Rc;

use crate::core::flags::LifecycleFlags;
use crate::core::value::Value;
use crate::scheduler::TaskPriority;

pub use computed::ComputedObserver;
pub use dirty_check::DirtyChecker;
pub use locator::ObserverLocator;
pub use observed::{BasicAccessor, ObservedObject};
pub use property::SetterObserver;
pub use subscriber::{
    CollectionChange, CollectionSubscriber, CollectionSubscriberCollection, Subscriber,
    SubscriberCollection,
};

/// The lightweight read/write contract for call sites that do not need
/// subscription. Writes through an accessor still route through the slot's
/// observer when one exists, so every subscriber sees the change no matter
/// who performed the write.
pub trait PropertyAccessor {
    fn get_value(&self) -> Value;
    fn set_value(&self, value: Value, flags: LifecycleFlags);
}

/// One observable slot: an accessor that also fans out change notifications.
pub trait PropertyObserver: PropertyAccessor {
    fn subscribe(&self, subscriber: Rc<dyn Subscriber>);
    fn unsubscribe(&self, subscriber: &Rc<dyn Subscriber>);
    fn has_subscribers(&self) -> bool;

    /// The scheduler tier deferred writes against this slot should target.
    fn flush_priority(&self) -> TaskPriority {
        TaskPriority::Render
    }
}
