// ============================================================================
// weft - Lifecycle Queues
// Depth-counted, reentrancy-safe ordering of bind/attach/mount transitions
// ============================================================================
//
// Seven queues: bound, unbound, attached, detached, mount, unmount, batch.
// Each of the depth-counted queues pairs a `begin_*` with an `end_*`; only
// the `end_*` that brings the depth back to zero drains the list, popping
// from the head so callbacks may re-add nodes (themselves included) without
// corrupting the traversal. Attach drains imply a following mount drain and
// detach drains imply a following unmount drain: visual insertion happens
// only after an entire subtree has finished its attach-phase callbacks.
//
// Mount and unmount are mutually exclusive per node. A node scheduled for
// both in the same turn executes in whichever queue it was added to last.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;

use crate::core::flags::{LifecycleFlags, QueueFlags};
use crate::error::Error;

// =============================================================================
// NODES
// =============================================================================

/// Queue-membership bits carried by every controller. The lifecycle sets a
/// bit when the node enters the matching queue and clears it on removal, so
/// repeated enqueues are idempotent.
#[derive(Default)]
pub struct LifecycleState {
    flags: Cell<QueueFlags>,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in(&self, queue: QueueFlags) -> bool {
        self.flags.get().contains(queue)
    }

    fn enter(&self, queue: QueueFlags) {
        self.flags.set(self.flags.get() | queue);
    }

    fn leave(&self, queue: QueueFlags) {
        self.flags.set(self.flags.get() - queue);
    }
}

/// A component controller participating in lifecycle ordering. Implementors
/// override the transitions they care about; the rest default to no-ops.
pub trait Controller {
    fn lifecycle_state(&self) -> &LifecycleState;

    fn bound(&self, _flags: LifecycleFlags) {}
    fn unbound(&self, _flags: LifecycleFlags) {}
    fn attached(&self, _flags: LifecycleFlags) {}
    fn detached(&self, _flags: LifecycleFlags) {}
    fn mount(&self, _flags: LifecycleFlags) {}
    fn unmount(&self, _flags: LifecycleFlags) {}
}

/// Work that coalesces while a batch is open and flushes when the outermost
/// batch closes. Collection observers implement this to emit one patch
/// notification per batch instead of one per mutation.
pub trait BatchItem {
    fn flush_batch(&self, flags: LifecycleFlags);
}

// =============================================================================
// LIFECYCLE
// =============================================================================

struct ControllerQueue {
    name: &'static str,
    membership: QueueFlags,
    depth: Cell<u32>,
    list: RefCell<VecDeque<Rc<dyn Controller>>>,
}

impl ControllerQueue {
    fn new(name: &'static str, membership: QueueFlags) -> Self {
        Self {
            name,
            membership,
            depth: Cell::new(0),
            list: RefCell::new(VecDeque::new()),
        }
    }

    /// Idempotent: a node already in this queue stays where it is.
    fn enqueue(&self, node: Rc<dyn Controller>) {
        if node.lifecycle_state().is_in(self.membership) {
            return;
        }
        node.lifecycle_state().enter(self.membership);
        self.list.borrow_mut().push_back(node);
    }

    fn remove(&self, node: &Rc<dyn Controller>) -> bool {
        if !node.lifecycle_state().is_in(self.membership) {
            return false;
        }
        let mut list = self.list.borrow_mut();
        let Some(pos) = list.iter().position(|n| Rc::ptr_eq(n, node)) else {
            panic!(
                "{}",
                Error::ReentrancyViolation { queue: self.name }
            );
        };
        list.remove(pos);
        node.lifecycle_state().leave(self.membership);
        true
    }

    fn begin(&self) {
        self.depth.set(self.depth.get() + 1);
    }

    /// True when this call closed the outermost `begin`.
    fn end(&self) -> bool {
        let depth = self.depth.get();
        assert!(depth > 0, "unbalanced end on lifecycle queue '{}'", self.name);
        self.depth.set(depth - 1);
        depth == 1
    }

    /// Pop-from-head drain: callbacks may re-add nodes (themselves
    /// included) and the drain picks them up in the same pass.
    fn drain(&self, flags: LifecycleFlags, invoke: impl Fn(&Rc<dyn Controller>, LifecycleFlags)) {
        loop {
            let node = self.list.borrow_mut().pop_front();
            let Some(node) = node else { break };
            if !node.lifecycle_state().is_in(self.membership) {
                panic!(
                    "{}",
                    Error::ReentrancyViolation { queue: self.name }
                );
            }
            node.lifecycle_state().leave(self.membership);
            invoke(&node, flags);
        }
        trace!(queue = self.name, "queue drained");
    }

    fn len(&self) -> usize {
        self.list.borrow().len()
    }
}

/// The ordering authority for component state transitions.
pub struct Lifecycle {
    bound: ControllerQueue,
    unbound: ControllerQueue,
    attached: ControllerQueue,
    detached: ControllerQueue,
    mount: ControllerQueue,
    unmount: ControllerQueue,
    batch_depth: Cell<u32>,
    batch: RefCell<VecDeque<Rc<dyn BatchItem>>>,
}

impl Lifecycle {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            bound: ControllerQueue::new("bound", QueueFlags::IN_BOUND),
            unbound: ControllerQueue::new("unbound", QueueFlags::IN_UNBOUND),
            attached: ControllerQueue::new("attached", QueueFlags::IN_ATTACHED),
            detached: ControllerQueue::new("detached", QueueFlags::IN_DETACHED),
            mount: ControllerQueue::new("mount", QueueFlags::IN_MOUNT),
            unmount: ControllerQueue::new("unmount", QueueFlags::IN_UNMOUNT),
            batch_depth: Cell::new(0),
            batch: RefCell::new(VecDeque::new()),
        })
    }

    // ------------------------------------------------------------------
    // bound / unbound
    // ------------------------------------------------------------------

    pub fn enqueue_bound(&self, node: Rc<dyn Controller>) {
        self.bound.enqueue(node);
    }

    pub fn enqueue_unbound(&self, node: Rc<dyn Controller>) {
        self.unbound.enqueue(node);
    }

    pub fn begin_bind(&self) {
        self.bound.begin();
    }

    pub fn end_bind(&self, flags: LifecycleFlags) {
        if self.bound.end() {
            self.bound.drain(flags, |node, flags| node.bound(flags));
        }
    }

    pub fn begin_unbind(&self) {
        self.unbound.begin();
    }

    pub fn end_unbind(&self, flags: LifecycleFlags) {
        if self.unbound.end() {
            self.unbound.drain(flags, |node, flags| node.unbound(flags));
        }
    }

    // ------------------------------------------------------------------
    // attached / detached, with deferred mount / unmount
    // ------------------------------------------------------------------

    pub fn enqueue_attached(&self, node: Rc<dyn Controller>) {
        self.attached.enqueue(node);
    }

    pub fn enqueue_detached(&self, node: Rc<dyn Controller>) {
        self.detached.enqueue(node);
    }

    /// Schedule a mount, evicting any pending unmount for the same node.
    pub fn enqueue_mount(&self, node: Rc<dyn Controller>) {
        self.unmount.remove(&node);
        self.mount.enqueue(node);
    }

    /// Schedule an unmount, evicting any pending mount for the same node.
    pub fn enqueue_unmount(&self, node: Rc<dyn Controller>) {
        self.mount.remove(&node);
        self.unmount.enqueue(node);
    }

    pub fn dequeue_mount(&self, node: &Rc<dyn Controller>) -> bool {
        self.mount.remove(node)
    }

    pub fn dequeue_unmount(&self, node: &Rc<dyn Controller>) -> bool {
        self.unmount.remove(node)
    }

    pub fn begin_attach(&self) {
        self.attached.begin();
    }

    /// Closing the outermost attach drains the attached queue and then the
    /// mount queue: the whole subtree finishes its attach callbacks before
    /// any node becomes visible.
    pub fn end_attach(&self, flags: LifecycleFlags) {
        if self.attached.end() {
            self.attached.drain(flags, |node, flags| node.attached(flags));
            self.process_mount_queue(flags);
        }
    }

    pub fn begin_detach(&self) {
        self.detached.begin();
    }

    pub fn end_detach(&self, flags: LifecycleFlags) {
        if self.detached.end() {
            self.detached.drain(flags, |node, flags| node.detached(flags));
            self.process_unmount_queue(flags);
        }
    }

    pub fn process_mount_queue(&self, flags: LifecycleFlags) {
        self.mount.drain(flags, |node, flags| node.mount(flags));
    }

    pub fn process_unmount_queue(&self, flags: LifecycleFlags) {
        self.unmount.drain(flags, |node, flags| node.unmount(flags));
    }

    // ------------------------------------------------------------------
    // batch
    // ------------------------------------------------------------------

    pub fn begin_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    pub fn end_batch(&self, flags: LifecycleFlags) {
        let depth = self.batch_depth.get();
        assert!(depth > 0, "unbalanced end on lifecycle queue 'batch'");
        self.batch_depth.set(depth - 1);
        if depth == 1 {
            loop {
                let item = self.batch.borrow_mut().pop_front();
                let Some(item) = item else { break };
                item.flush_batch(flags | LifecycleFlags::IN_BATCH);
            }
        }
    }

    pub fn batch_depth(&self) -> u32 {
        self.batch_depth.get()
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    /// Callers are responsible for not enqueueing the same item twice;
    /// collection observers track that with their own membership flag.
    pub fn enqueue_batch(&self, item: Rc<dyn BatchItem>) {
        self.batch.borrow_mut().push_back(item);
    }

    pub fn queued_bound(&self) -> usize {
        self.bound.len()
    }

    pub fn queued_mount(&self) -> usize {
        self.mount.len()
    }

    pub fn queued_unmount(&self) -> usize {
        self.unmount.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct TestNode {
        name: &'static str,
        state: LifecycleState,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl TestNode {
        fn new(name: &'static str, log: Rc<RefCell<Vec<String>>>) -> Rc<Self> {
            Rc::new(Self {
                name,
                state: LifecycleState::new(),
                log,
            })
        }
    }

    impl Controller for TestNode {
        fn lifecycle_state(&self) -> &LifecycleState {
            &self.state
        }

        fn bound(&self, _flags: LifecycleFlags) {
            self.log.borrow_mut().push(format!("{}:bound", self.name));
        }

        fn unbound(&self, _flags: LifecycleFlags) {
            self.log.borrow_mut().push(format!("{}:unbound", self.name));
        }

        fn attached(&self, _flags: LifecycleFlags) {
            self.log.borrow_mut().push(format!("{}:attached", self.name));
        }

        fn detached(&self, _flags: LifecycleFlags) {
            self.log.borrow_mut().push(format!("{}:detached", self.name));
        }

        fn mount(&self, _flags: LifecycleFlags) {
            self.log.borrow_mut().push(format!("{}:mount", self.name));
        }

        fn unmount(&self, _flags: LifecycleFlags) {
            self.log.borrow_mut().push(format!("{}:unmount", self.name));
        }
    }

    fn log() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn nested_begin_end_drains_only_at_zero_depth() {
        let lifecycle = Lifecycle::new();
        let log = log();
        let node = TestNode::new("a", log.clone());

        lifecycle.begin_bind();
        lifecycle.begin_bind();
        lifecycle.enqueue_bound(node.clone());

        lifecycle.end_bind(LifecycleFlags::FROM_BIND);
        assert!(log.borrow().is_empty());

        lifecycle.end_bind(LifecycleFlags::FROM_BIND);
        assert_eq!(*log.borrow(), vec!["a:bound"]);
        assert!(!node.state.is_in(QueueFlags::IN_BOUND));
    }

    #[test]
    fn repeated_enqueue_is_idempotent() {
        let lifecycle = Lifecycle::new();
        let log = log();
        let node = TestNode::new("a", log.clone());

        lifecycle.begin_bind();
        lifecycle.enqueue_bound(node.clone());
        lifecycle.enqueue_bound(node.clone());
        lifecycle.enqueue_bound(node);
        lifecycle.end_bind(LifecycleFlags::empty());

        assert_eq!(*log.borrow(), vec!["a:bound"]);
    }

    #[test]
    fn attach_drain_is_followed_by_mount_drain() {
        let lifecycle = Lifecycle::new();
        let log = log();
        let a = TestNode::new("a", log.clone());
        let b = TestNode::new("b", log.clone());

        lifecycle.begin_attach();
        lifecycle.enqueue_attached(a.clone());
        lifecycle.enqueue_mount(a);
        lifecycle.enqueue_attached(b.clone());
        lifecycle.enqueue_mount(b);
        lifecycle.end_attach(LifecycleFlags::empty());

        // Every attached callback runs before any mount callback.
        assert_eq!(
            *log.borrow(),
            vec!["a:attached", "b:attached", "a:mount", "b:mount"]
        );
    }

    #[test]
    fn detach_drain_is_followed_by_unmount_drain() {
        let lifecycle = Lifecycle::new();
        let log = log();
        let a = TestNode::new("a", log.clone());

        lifecycle.begin_detach();
        lifecycle.enqueue_detached(a.clone());
        lifecycle.enqueue_unmount(a);
        lifecycle.end_detach(LifecycleFlags::empty());

        assert_eq!(*log.borrow(), vec!["a:detached", "a:unmount"]);
    }

    #[test]
    fn mount_and_unmount_are_mutually_exclusive() {
        let lifecycle = Lifecycle::new();
        let log = log();
        let node = TestNode::new("a", log.clone());

        // Last add wins: unmount then mount leaves only mount.
        lifecycle.enqueue_unmount(node.clone());
        lifecycle.enqueue_mount(node.clone());
        assert_eq!(lifecycle.queued_mount(), 1);
        assert_eq!(lifecycle.queued_unmount(), 0);

        lifecycle.process_mount_queue(LifecycleFlags::empty());
        lifecycle.process_unmount_queue(LifecycleFlags::empty());
        assert_eq!(*log.borrow(), vec!["a:mount"]);

        // And the other way around.
        log.borrow_mut().clear();
        lifecycle.enqueue_mount(node.clone());
        lifecycle.enqueue_unmount(node.clone());
        assert_eq!(lifecycle.queued_mount(), 0);
        assert_eq!(lifecycle.queued_unmount(), 1);

        lifecycle.process_mount_queue(LifecycleFlags::empty());
        lifecycle.process_unmount_queue(LifecycleFlags::empty());
        assert_eq!(*log.borrow(), vec!["a:unmount"]);
    }

    #[test]
    fn cancelled_node_executes_in_neither_queue() {
        let lifecycle = Lifecycle::new();
        let log = log();
        let node = TestNode::new("a", log.clone());

        lifecycle.enqueue_mount(node.clone());
        let node: Rc<dyn Controller> = node;
        assert!(lifecycle.dequeue_mount(&node));
        lifecycle.process_mount_queue(LifecycleFlags::empty());
        lifecycle.process_unmount_queue(LifecycleFlags::empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn nodes_added_during_drain_run_in_the_same_pass() {
        struct Chaining {
            state: LifecycleState,
            lifecycle: Rc<Lifecycle>,
            next: Rc<dyn Controller>,
            log: Rc<RefCell<Vec<String>>>,
        }

        impl Controller for Chaining {
            fn lifecycle_state(&self) -> &LifecycleState {
                &self.state
            }

            fn bound(&self, _flags: LifecycleFlags) {
                self.log.borrow_mut().push("chain:bound".into());
                self.lifecycle.enqueue_bound(self.next.clone());
            }
        }

        let lifecycle = Lifecycle::new();
        let log = log();
        let tail = TestNode::new("tail", log.clone());
        let head = Rc::new(Chaining {
            state: LifecycleState::new(),
            lifecycle: lifecycle.clone(),
            next: tail,
            log: log.clone(),
        });

        lifecycle.begin_bind();
        lifecycle.enqueue_bound(head);
        lifecycle.end_bind(LifecycleFlags::empty());

        assert_eq!(*log.borrow(), vec!["chain:bound", "tail:bound"]);
    }

    #[test]
    fn batch_defers_flush_items_until_outermost_end() {
        struct Item {
            log: Rc<RefCell<Vec<String>>>,
        }

        impl BatchItem for Item {
            fn flush_batch(&self, flags: LifecycleFlags) {
                assert!(flags.contains(LifecycleFlags::IN_BATCH));
                self.log.borrow_mut().push("flushed".into());
            }
        }

        let lifecycle = Lifecycle::new();
        let log = log();

        lifecycle.begin_batch();
        lifecycle.begin_batch();
        lifecycle.enqueue_batch(Rc::new(Item { log: log.clone() }));
        assert!(lifecycle.is_batching());

        lifecycle.end_batch(LifecycleFlags::empty());
        assert!(log.borrow().is_empty());

        lifecycle.end_batch(LifecycleFlags::empty());
        assert_eq!(*log.borrow(), vec!["flushed"]);
        assert_eq!(lifecycle.batch_depth(), 0);
    }

    #[test]
    #[should_panic(expected = "unbalanced end")]
    fn unbalanced_end_panics() {
        let lifecycle = Lifecycle::new();
        lifecycle.end_bind(LifecycleFlags::empty());
    }
}
