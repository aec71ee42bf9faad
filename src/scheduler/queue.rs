// ============================================================================
// weft - Task Queue
// One priority tier: pending/delayed lists, host-flush bookkeeping, pooling
// ============================================================================
//
// Each queue owns its host-flush request: the first task entering an empty
// queue requests a flush for its tier, and removing the last pending task
// cancels the request. A flush drains a snapshot of the pending list, so
// tasks enqueued by running callbacks wait for the next flush; persistent
// tasks go straight back to pending after running.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;

use crate::core::platform::HostPlatform;
use crate::scheduler::task::{QueueTaskOptions, Task, TaskHandle, TaskPriority, TaskStatus};

/// Hard cap on consecutive drain passes before assuming runaway recursion.
const MAX_FLUSH_COUNT: usize = 1000;

pub struct TaskQueue {
    priority: TaskPriority,
    platform: Rc<dyn HostPlatform>,
    pending: RefCell<VecDeque<Rc<Task>>>,
    delayed: RefCell<Vec<Rc<Task>>>,
    /// In-flight snapshot guard: true while a flush pass is running.
    processing: Cell<bool>,
    flush_requested: Cell<bool>,
    /// Completed reusable task objects awaiting their next occupant.
    pool: RefCell<Vec<Rc<Task>>>,
}

impl TaskQueue {
    pub(crate) fn new(priority: TaskPriority, platform: Rc<dyn HostPlatform>) -> Rc<Self> {
        Rc::new(Self {
            priority,
            platform,
            pending: RefCell::new(VecDeque::new()),
            delayed: RefCell::new(Vec::new()),
            processing: Cell::new(false),
            flush_requested: Cell::new(false),
            pool: RefCell::new(Vec::new()),
        })
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub(crate) fn queue_task(
        self: &Rc<Self>,
        callback: Box<dyn FnMut()>,
        opts: QueueTaskOptions,
    ) -> TaskHandle {
        let now = self.platform.now();
        let task = if opts.reusable {
            match self.pool.borrow_mut().pop() {
                Some(pooled) => {
                    pooled.reset(callback, &opts, now);
                    pooled
                }
                None => Task::new(callback, &opts, now),
            }
        } else {
            Task::new(callback, &opts, now)
        };

        if !task.is_due(now) {
            self.delayed.borrow_mut().push(task.clone());
        } else if task.is_preempt() {
            self.pending.borrow_mut().push_front(task.clone());
        } else {
            self.pending.borrow_mut().push_back(task.clone());
        }

        if !self.flush_requested.get() {
            self.flush_requested.set(true);
            self.platform.request_flush(self.priority);
        }

        TaskHandle {
            generation: task.generation(),
            task,
            queue: Rc::downgrade(self),
        }
    }

    /// One flush pass: promote due delayed tasks, then run a snapshot of the
    /// pending list. Tasks enqueued by running callbacks run on the next
    /// pass. Reentrant flush from inside a callback is a no-op.
    pub fn flush(&self, now: f64) {
        if self.processing.get() {
            return;
        }
        self.flush_requested.set(false);
        self.processing.set(true);

        self.promote_due(now);
        let snapshot: Vec<Rc<Task>> = self.pending.borrow_mut().drain(..).collect();
        trace!(priority = %self.priority, tasks = snapshot.len(), "flushing tier");

        for task in snapshot {
            if task.status() != TaskStatus::Pending {
                continue;
            }
            task.set_status(TaskStatus::Running);
            task.run();
            if task.is_persistent() {
                task.set_status(TaskStatus::Pending);
                self.pending.borrow_mut().push_back(task);
            } else {
                task.set_status(TaskStatus::Completed);
                if task.is_reusable() {
                    task.clear_callback();
                    self.pool.borrow_mut().push(task);
                }
            }
        }

        self.processing.set(false);

        let has_work = !self.pending.borrow().is_empty() || !self.delayed.borrow().is_empty();
        if has_work && !self.flush_requested.get() {
            self.flush_requested.set(true);
            self.platform.request_flush(self.priority);
        }
    }

    fn promote_due(&self, now: f64) {
        let mut delayed = self.delayed.borrow_mut();
        if delayed.is_empty() {
            return;
        }
        let mut pending = self.pending.borrow_mut();
        let mut i = 0;
        while i < delayed.len() {
            if delayed[i].is_due(now) {
                let task = delayed.remove(i);
                if task.is_preempt() {
                    pending.push_front(task);
                } else {
                    pending.push_back(task);
                }
            } else {
                i += 1;
            }
        }
    }

    /// Cancel a pending task. When it removes the last queued task, the
    /// tier's pending host-flush request is cancelled too.
    pub(crate) fn remove_task(&self, task: &Rc<Task>) -> bool {
        let mut found = false;
        {
            let mut pending = self.pending.borrow_mut();
            if let Some(pos) = pending.iter().position(|t| Rc::ptr_eq(t, task)) {
                pending.remove(pos);
                found = true;
            }
        }
        if !found {
            let mut delayed = self.delayed.borrow_mut();
            if let Some(pos) = delayed.iter().position(|t| Rc::ptr_eq(t, task)) {
                delayed.remove(pos);
                found = true;
            }
        }
        // Still pending but in neither list mid-flush: it sits in the
        // running snapshot and is skipped there once marked.
        if !found && self.processing.get() && task.status() == TaskStatus::Pending {
            found = true;
        }
        if !found {
            return false;
        }

        task.set_status(TaskStatus::Cancelled);
        task.clear_callback();

        if self.pending.borrow().is_empty()
            && self.delayed.borrow().is_empty()
            && self.flush_requested.get()
        {
            self.flush_requested.set(false);
            self.platform.cancel_flush(self.priority);
        }
        true
    }

    /// Whether the queue has work left to settle. Persistent tasks and
    /// not-yet-due delayed tasks do not count: a drain is not expected to
    /// wait them out.
    pub fn is_empty(&self) -> bool {
        let now = self.platform.now();
        self.pending.borrow().iter().all(|t| t.is_persistent())
            && self
                .delayed
                .borrow()
                .iter()
                .all(|t| t.is_persistent() || !t.is_due(now))
    }

    /// Total queued tasks, delayed and persistent included.
    pub fn size(&self) -> usize {
        self.pending.borrow().len() + self.delayed.borrow().len()
    }

    /// Flush until settled. Panics after `MAX_FLUSH_COUNT` passes, which
    /// indicates tasks enqueuing each other without end.
    pub fn drain(&self) {
        let mut passes = 0;
        while !self.is_empty() {
            self.flush(self.platform.now());
            passes += 1;
            if passes >= MAX_FLUSH_COUNT {
                panic!(
                    "task queue '{}' failed to settle after {} flush passes",
                    self.priority, MAX_FLUSH_COUNT
                );
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
