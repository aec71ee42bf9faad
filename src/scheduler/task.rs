// ============================================================================
// weft - Tasks
// Priorities, status machine and cancellable handles for deferred work
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::scheduler::queue::TaskQueue;

// =============================================================================
// PRIORITY
// =============================================================================

/// The five scheduling tiers, ascending by latency. `MicroTask` runs
/// soonest, `Idle` runs last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    MicroTask = 0,
    Render = 1,
    MacroTask = 2,
    PostRender = 3,
    Idle = 4,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 5] = [
        TaskPriority::MicroTask,
        TaskPriority::Render,
        TaskPriority::MacroTask,
        TaskPriority::PostRender,
        TaskPriority::Idle,
    ];

    /// Tiers from least to most urgent, the order a full-drain pass visits
    /// them.
    pub fn descending() -> [TaskPriority; 5] {
        [
            TaskPriority::Idle,
            TaskPriority::PostRender,
            TaskPriority::MacroTask,
            TaskPriority::Render,
            TaskPriority::MicroTask,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskPriority::MicroTask => "microTask",
            TaskPriority::Render => "render",
            TaskPriority::MacroTask => "macroTask",
            TaskPriority::PostRender => "postRender",
            TaskPriority::Idle => "idle",
        };
        f.write_str(name)
    }
}

// =============================================================================
// STATUS
// =============================================================================

/// `Pending` → `Running` → (`Completed` | back to `Pending` when
/// persistent). `Cancelled` is reachable from `Pending` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Options accepted by `Scheduler::queue_task`.
#[derive(Debug, Clone, Copy)]
pub struct QueueTaskOptions {
    pub priority: TaskPriority,
    /// Virtual milliseconds before the task becomes eligible to run.
    pub delay: f64,
    /// Run ahead of already-queued non-preempt tasks in the same tier.
    pub preempt: bool,
    /// Re-enqueue after each run, until cancelled.
    pub persistent: bool,
    /// Return the task object to the queue's pool after completion.
    pub reusable: bool,
}

impl Default for QueueTaskOptions {
    fn default() -> Self {
        Self {
            priority: TaskPriority::MacroTask,
            delay: 0.0,
            preempt: false,
            persistent: false,
            reusable: false,
        }
    }
}

// =============================================================================
// TASK
// =============================================================================

/// A unit of deferred work owned by one queue. All fields are cells so a
/// pooled task object can be re-initialized for its next occupant. The
/// generation counter ties each occupancy to the handles issued for it:
/// handles from an earlier occupancy must not read or cancel the current
/// one.
pub struct Task {
    status: Cell<TaskStatus>,
    generation: Cell<u64>,
    priority: Cell<TaskPriority>,
    queue_time: Cell<f64>,
    due_time: Cell<f64>,
    preempt: Cell<bool>,
    persistent: Cell<bool>,
    reusable: Cell<bool>,
    callback: RefCell<Option<Box<dyn FnMut()>>>,
}

impl Task {
    pub(crate) fn new(callback: Box<dyn FnMut()>, opts: &QueueTaskOptions, now: f64) -> Rc<Self> {
        let task = Rc::new(Self {
            status: Cell::new(TaskStatus::Pending),
            generation: Cell::new(0),
            priority: Cell::new(opts.priority),
            queue_time: Cell::new(0.0),
            due_time: Cell::new(0.0),
            preempt: Cell::new(false),
            persistent: Cell::new(false),
            reusable: Cell::new(false),
            callback: RefCell::new(None),
        });
        task.reset(callback, opts, now);
        task
    }

    /// Re-initialize for a new occupant. Used both at creation and when a
    /// pooled task is handed out again.
    pub(crate) fn reset(&self, callback: Box<dyn FnMut()>, opts: &QueueTaskOptions, now: f64) {
        self.generation.set(self.generation.get() + 1);
        self.status.set(TaskStatus::Pending);
        self.priority.set(opts.priority);
        self.queue_time.set(now);
        self.due_time.set(now + opts.delay);
        self.preempt.set(opts.preempt);
        self.persistent.set(opts.persistent);
        self.reusable.set(opts.reusable);
        *self.callback.borrow_mut() = Some(callback);
    }

    pub fn status(&self) -> TaskStatus {
        self.status.get()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority.get()
    }

    pub fn queue_time(&self) -> f64 {
        self.queue_time.get()
    }

    #[cfg(test)]
    pub(crate) fn due_time(&self) -> f64 {
        self.due_time.get()
    }

    pub(crate) fn is_due(&self, now: f64) -> bool {
        self.due_time.get() <= now
    }

    pub(crate) fn is_preempt(&self) -> bool {
        self.preempt.get()
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent.get()
    }

    pub(crate) fn is_reusable(&self) -> bool {
        self.reusable.get()
    }

    pub(crate) fn set_status(&self, status: TaskStatus) {
        self.status.set(status);
    }

    /// Run the callback. The callback is moved out for the duration of the
    /// call so a reentrant flush never aliases the `FnMut` borrow, then put
    /// back for persistent tasks.
    pub(crate) fn run(&self) {
        let taken = self.callback.borrow_mut().take();
        if let Some(mut callback) = taken {
            callback();
            if self.persistent.get() {
                *self.callback.borrow_mut() = Some(callback);
            }
        }
    }

    pub(crate) fn clear_callback(&self) {
        *self.callback.borrow_mut() = None;
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("status", &self.status.get())
            .field("priority", &self.priority.get())
            .field("due_time", &self.due_time.get())
            .field("persistent", &self.persistent.get())
            .finish()
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Caller-facing handle to one occupancy of a queued task. If the task
/// object has since been pooled and handed to a different caller, the stale
/// handle reports `Completed` and cannot cancel the new occupant.
#[derive(Clone)]
pub struct TaskHandle {
    pub(crate) task: Rc<Task>,
    pub(crate) generation: u64,
    pub(crate) queue: Weak<TaskQueue>,
}

impl TaskHandle {
    fn is_stale(&self) -> bool {
        self.task.generation() != self.generation
    }

    pub fn status(&self) -> TaskStatus {
        if self.is_stale() {
            return TaskStatus::Completed;
        }
        self.task.status()
    }

    pub fn priority(&self) -> TaskPriority {
        self.task.priority()
    }

    /// Cancel the task. A no-op once the task has entered `Running` (or a
    /// terminal state); returns whether the cancellation took effect.
    /// Cancelling the last pending task in a tier also cancels that tier's
    /// pending host-flush request.
    pub fn cancel(&self) -> bool {
        if self.is_stale() || self.task.status() != TaskStatus::Pending {
            return false;
        }
        match self.queue.upgrade() {
            Some(queue) => queue.remove_task(&self.task),
            None => false,
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("status", &self.status())
            .field("priority", &self.task.priority())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
