// ============================================================================
// weft - Host Platform
// The request/cancel contract between the scheduler and its host event loop
// ============================================================================
//
// The scheduler never talks to a concrete event loop. Each tier asks the
// host to fire its flush via request_flush and retracts the request via
// cancel_flush when its queue empties first. A browser host maps the tiers
// to queueMicrotask / requestAnimationFrame / setTimeout / requestIdleCallback
// equivalents; the VirtualPlatform below records requests and exposes a
// manually advanced clock for headless harnesses.
// ============================================================================

use std::cell::Cell;

use crate::scheduler::TaskPriority;

/// Flush primitives supplied by the embedding host.
///
/// The core depends only on this request/cancel contract, not on any
/// specific host API. Implementations must be cheap to call repeatedly;
/// the scheduler guarantees at most one outstanding request per tier.
pub trait HostPlatform {
    /// Current time in milliseconds, monotonic within one host.
    fn now(&self) -> f64;

    /// Ask the host to call `Scheduler::flush(priority)` at the timing
    /// appropriate for the tier.
    fn request_flush(&self, priority: TaskPriority);

    /// Retract a previously issued flush request for the tier.
    fn cancel_flush(&self, priority: TaskPriority);
}

// =============================================================================
// VIRTUAL PLATFORM
// =============================================================================

/// A headless host with a manually advanced clock.
///
/// Records flush requests and cancellations per tier instead of scheduling
/// anything. Test harnesses and server-side embeddings drive the scheduler
/// themselves: check [`has_pending_flush`](Self::has_pending_flush), call
/// `Scheduler::flush`, advance time with [`advance`](Self::advance).
#[derive(Default)]
pub struct VirtualPlatform {
    now: Cell<f64>,
    pending: [Cell<bool>; 5],
    requests: [Cell<u32>; 5],
    cancels: [Cell<u32>; 5],
}

impl VirtualPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the virtual clock by `delta` milliseconds.
    pub fn advance(&self, delta: f64) {
        self.now.set(self.now.get() + delta);
    }

    /// Whether a flush request for the tier is outstanding.
    pub fn has_pending_flush(&self, priority: TaskPriority) -> bool {
        self.pending[priority.index()].get()
    }

    /// Consume the pending request for the tier, returning whether there
    /// was one. Drivers call this before flushing.
    pub fn take_pending_flush(&self, priority: TaskPriority) -> bool {
        self.pending[priority.index()].replace(false)
    }

    /// Total flush requests issued for the tier.
    pub fn request_count(&self, priority: TaskPriority) -> u32 {
        self.requests[priority.index()].get()
    }

    /// Total flush cancellations issued for the tier.
    pub fn cancel_count(&self, priority: TaskPriority) -> u32 {
        self.cancels[priority.index()].get()
    }
}

impl HostPlatform for VirtualPlatform {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn request_flush(&self, priority: TaskPriority) {
        let i = priority.index();
        self.pending[i].set(true);
        self.requests[i].set(self.requests[i].get() + 1);
    }

    fn cancel_flush(&self, priority: TaskPriority) {
        let i = priority.index();
        self.pending[i].set(false);
        self.cancels[i].set(self.cancels[i].get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_advances() {
        let platform = VirtualPlatform::new();
        assert_eq!(platform.now(), 0.0);
        platform.advance(16.0);
        assert_eq!(platform.now(), 16.0);
    }

    #[test]
    fn requests_and_cancels_are_counted_per_tier() {
        let platform = VirtualPlatform::new();

        platform.request_flush(TaskPriority::Render);
        assert!(platform.has_pending_flush(TaskPriority::Render));
        assert!(!platform.has_pending_flush(TaskPriority::Idle));
        assert_eq!(platform.request_count(TaskPriority::Render), 1);

        platform.cancel_flush(TaskPriority::Render);
        assert!(!platform.has_pending_flush(TaskPriority::Render));
        assert_eq!(platform.cancel_count(TaskPriority::Render), 1);
    }

    #[test]
    fn take_pending_consumes_the_request() {
        let platform = VirtualPlatform::new();
        platform.request_flush(TaskPriority::MicroTask);
        assert!(platform.take_pending_flush(TaskPriority::MicroTask));
        assert!(!platform.take_pending_flush(TaskPriority::MicroTask));
    }
}
