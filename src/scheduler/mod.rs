// ============================================================================
// weft - Task Scheduler
// Five priority tiers, each with its own queue and host-flush requestor
// ============================================================================
//
// The host owns the actual timing primitives (microtask, animation frame,
// timer, idle callback or their equivalents). The scheduler only tracks what
// is queued per tier and asks the host, through `HostPlatform`, to call
// `flush` for a tier when that tier has work. There are no real suspension
// points in this single-threaded core, so `yield_priority` and `yield_all`
// drain synchronously: they stand in for awaiting "settled" state.
// ============================================================================

pub mod queue;
pub mod task;

pub use queue::TaskQueue;
pub use task::{QueueTaskOptions, Task, TaskHandle, TaskPriority, TaskStatus};

use std::rc::Rc;

use tracing::debug;

use crate::core::platform::HostPlatform;

pub struct Scheduler {
    platform: Rc<dyn HostPlatform>,
    queues: [Rc<TaskQueue>; 5],
}

impl Scheduler {
    pub fn new(platform: Rc<dyn HostPlatform>) -> Rc<Self> {
        let queues = TaskPriority::ALL.map(|p| TaskQueue::new(p, platform.clone()));
        Rc::new(Self { platform, queues })
    }

    /// Enqueue deferred work at the tier named in `opts`.
    pub fn queue_task(
        &self,
        callback: impl FnMut() + 'static,
        opts: QueueTaskOptions,
    ) -> TaskHandle {
        self.queue_for(opts.priority).queue_task(Box::new(callback), opts)
    }

    pub fn queue_for(&self, priority: TaskPriority) -> &Rc<TaskQueue> {
        &self.queues[priority.index()]
    }

    pub fn micro_task_queue(&self) -> &Rc<TaskQueue> {
        self.queue_for(TaskPriority::MicroTask)
    }

    pub fn render_queue(&self) -> &Rc<TaskQueue> {
        self.queue_for(TaskPriority::Render)
    }

    pub fn macro_task_queue(&self) -> &Rc<TaskQueue> {
        self.queue_for(TaskPriority::MacroTask)
    }

    pub fn post_render_queue(&self) -> &Rc<TaskQueue> {
        self.queue_for(TaskPriority::PostRender)
    }

    pub fn idle_queue(&self) -> &Rc<TaskQueue> {
        self.queue_for(TaskPriority::Idle)
    }

    /// Host entry point: run one flush pass for a tier. The host calls this
    /// in response to a `request_flush` for the same tier.
    pub fn flush(&self, priority: TaskPriority) {
        self.queue_for(priority).flush(self.platform.now());
    }

    /// Settle one tier: flush until it has no runnable work left, including
    /// tasks enqueued by tasks run along the way.
    pub fn yield_priority(&self, priority: TaskPriority) {
        self.queue_for(priority).drain();
    }

    /// Settle all five tiers, visiting them from least to most urgent
    /// (idle first, micro-task last) once per round. Multiple rounds catch
    /// work that a more urgent tier scheduled onto a less urgent one.
    pub fn yield_all(&self, rounds: usize) {
        for round in 0..rounds {
            debug!(round, "draining all tiers");
            for priority in TaskPriority::descending() {
                self.queue_for(priority).drain();
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::VirtualPlatform;
    use std::cell::{Cell, RefCell};

    fn scheduler_with_platform() -> (Rc<Scheduler>, Rc<VirtualPlatform>) {
        let platform = Rc::new(VirtualPlatform::new());
        (Scheduler::new(platform.clone()), platform)
    }

    #[test]
    fn queue_task_routes_by_priority() {
        let (scheduler, _platform) = scheduler_with_platform();

        scheduler.queue_task(|| {}, QueueTaskOptions {
            priority: TaskPriority::Render,
            ..Default::default()
        });
        scheduler.queue_task(|| {}, QueueTaskOptions::default());

        assert_eq!(scheduler.render_queue().size(), 1);
        assert_eq!(scheduler.macro_task_queue().size(), 1);
        assert_eq!(scheduler.micro_task_queue().size(), 0);
    }

    #[test]
    fn each_tier_requests_its_own_host_flush() {
        let (scheduler, platform) = scheduler_with_platform();

        scheduler.queue_task(|| {}, QueueTaskOptions {
            priority: TaskPriority::MicroTask,
            ..Default::default()
        });
        scheduler.queue_task(|| {}, QueueTaskOptions {
            priority: TaskPriority::Idle,
            ..Default::default()
        });

        assert!(platform.has_pending_flush(TaskPriority::MicroTask));
        assert!(platform.has_pending_flush(TaskPriority::Idle));
        assert!(!platform.has_pending_flush(TaskPriority::Render));
    }

    #[test]
    fn yield_all_drains_idle_first_and_micro_task_last() {
        let (scheduler, _platform) = scheduler_with_platform();
        let order = Rc::new(RefCell::new(Vec::new()));

        for priority in TaskPriority::ALL {
            let order = order.clone();
            scheduler.queue_task(
                move || order.borrow_mut().push(priority),
                QueueTaskOptions {
                    priority,
                    ..Default::default()
                },
            );
        }

        scheduler.yield_all(1);
        assert_eq!(*order.borrow(), TaskPriority::descending().to_vec());
    }

    #[test]
    fn a_second_round_catches_cross_tier_enqueues() {
        let (scheduler, _platform) = scheduler_with_platform();
        let ran = Rc::new(Cell::new(false));

        // A micro-task (drained last) schedules idle work (drained first):
        // one round misses it, the next round picks it up.
        let s = scheduler.clone();
        let r = ran.clone();
        scheduler.queue_task(
            move || {
                let r = r.clone();
                s.queue_task(
                    move || r.set(true),
                    QueueTaskOptions {
                        priority: TaskPriority::Idle,
                        ..Default::default()
                    },
                );
            },
            QueueTaskOptions {
                priority: TaskPriority::MicroTask,
                ..Default::default()
            },
        );

        scheduler.yield_all(1);
        assert!(!ran.get());
        scheduler.yield_all(1);
        assert!(ran.get());
    }

    #[test]
    fn yield_priority_settles_a_single_tier() {
        let (scheduler, _platform) = scheduler_with_platform();
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        scheduler.queue_task(
            move || c.set(c.get() + 1),
            QueueTaskOptions {
                priority: TaskPriority::Render,
                ..Default::default()
            },
        );
        let c = count.clone();
        scheduler.queue_task(move || c.set(c.get() + 1), QueueTaskOptions::default());

        scheduler.yield_priority(TaskPriority::Render);
        assert_eq!(count.get(), 1);
        assert_eq!(scheduler.macro_task_queue().size(), 1);
    }
}
