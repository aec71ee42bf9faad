// ============================================================================
// weft - Runtime
// Explicit wiring of platform, scheduler, lifecycle and observer locator
// ============================================================================
//
// There is no ambient global registration: the caller creates a Runtime,
// passes its pieces to whatever needs them, and disposes it when done. Two
// runtimes on the same thread do not interfere.
// ============================================================================

use std::rc::Rc;

use crate::core::platform::HostPlatform;
use crate::lifecycle::Lifecycle;
use crate::observation::locator::ObserverLocator;
use crate::scheduler::Scheduler;

/// The caller-owned handle tying one reactive core together.
pub struct Runtime {
    platform: Rc<dyn HostPlatform>,
    scheduler: Rc<Scheduler>,
    lifecycle: Rc<Lifecycle>,
    locator: Rc<ObserverLocator>,
}

impl Runtime {
    pub fn new(platform: Rc<dyn HostPlatform>) -> Rc<Self> {
        let scheduler = Scheduler::new(platform.clone());
        let lifecycle = Lifecycle::new();
        let locator = ObserverLocator::new(scheduler.clone());
        Rc::new(Self {
            platform,
            scheduler,
            lifecycle,
            locator,
        })
    }

    pub fn platform(&self) -> &Rc<dyn HostPlatform> {
        &self.platform
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    pub fn lifecycle(&self) -> &Rc<Lifecycle> {
        &self.lifecycle
    }

    pub fn locator(&self) -> &Rc<ObserverLocator> {
        &self.locator
    }

    /// Tear down background work (the dirty-check poll task). Bindings and
    /// observers created through this runtime remain valid but stop
    /// receiving poll-driven notifications.
    pub fn dispose(&self) {
        self.locator.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::VirtualPlatform;

    #[test]
    fn runtime_wires_the_pieces_together() {
        let runtime = Runtime::new(Rc::new(VirtualPlatform::new()));
        assert_eq!(runtime.scheduler().micro_task_queue().size(), 0);
        assert_eq!(runtime.lifecycle().batch_depth(), 0);
        runtime.dispose();
    }

    #[test]
    fn two_runtimes_do_not_share_state() {
        let a = Runtime::new(Rc::new(VirtualPlatform::new()));
        let b = Runtime::new(Rc::new(VirtualPlatform::new()));

        a.lifecycle().begin_batch();
        assert_eq!(a.lifecycle().batch_depth(), 1);
        assert_eq!(b.lifecycle().batch_depth(), 0);
        a.lifecycle().end_batch(Default::default());
    }
}
