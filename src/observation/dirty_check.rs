// ============================================================================
// weft - Dirty Checker
// Poll-based fallback for computed slots with no declared dependencies
// ============================================================================
//
// One persistent macro-task-tier task polls every registered entry per
// flush, comparing the re-derived value against the cache and notifying on
// change. The task starts with the first entry and is cancelled when the
// last entry leaves (or on Runtime::dispose).
// ============================================================================

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::core::flags::LifecycleFlags;
use crate::observation::computed::ComputedObserver;
use crate::scheduler::{QueueTaskOptions, Scheduler, TaskHandle, TaskPriority};

pub struct DirtyChecker {
    scheduler: Rc<Scheduler>,
    entries: RefCell<Vec<Rc<ComputedObserver>>>,
    poll_task: RefCell<Option<TaskHandle>>,
}

impl DirtyChecker {
    pub(crate) fn new(scheduler: Rc<Scheduler>) -> Rc<Self> {
        Rc::new(Self {
            scheduler,
            entries: RefCell::new(Vec::new()),
            poll_task: RefCell::new(None),
        })
    }

    pub fn add_entry(self: &Rc<Self>, observer: Rc<ComputedObserver>) {
        {
            let mut entries = self.entries.borrow_mut();
            if entries.iter().any(|e| Rc::ptr_eq(e, &observer)) {
                return;
            }
            debug!(property = observer.key(), "dirty-check entry added");
            entries.push(observer);
        }
        self.ensure_polling();
    }

    pub fn remove_entry(&self, observer: &Rc<ComputedObserver>) {
        self.entries
            .borrow_mut()
            .retain(|e| !Rc::ptr_eq(e, observer));
        if self.entries.borrow().is_empty() {
            self.stop();
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Poll every entry once.
    pub fn poll(&self, flags: LifecycleFlags) {
        let snapshot: Vec<Rc<ComputedObserver>> = self.entries.borrow().clone();
        for entry in snapshot {
            if entry.check(flags) {
                trace!(property = entry.key(), "dirty-check detected change");
            }
        }
    }

    /// Cancel the poll task. Entries stay registered; polling resumes when
    /// the next entry is added.
    pub fn stop(&self) {
        if let Some(task) = self.poll_task.borrow_mut().take() {
            task.cancel();
        }
    }

    fn ensure_polling(self: &Rc<Self>) {
        let mut slot = self.poll_task.borrow_mut();
        let running = slot
            .as_ref()
            .is_some_and(|task| !task.status().is_terminal());
        if running {
            return;
        }

        let weak: Weak<Self> = Rc::downgrade(self);
        let handle = self.scheduler.queue_task(
            move || {
                if let Some(checker) = weak.upgrade() {
                    checker.poll(LifecycleFlags::FROM_TICK);
                }
            },
            QueueTaskOptions {
                priority: TaskPriority::MacroTask,
                persistent: true,
                ..Default::default()
            },
        );
        *slot = Some(handle);
    }
}

// =============================================================================
// TESTS
// =============================================================================
