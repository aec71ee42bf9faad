// ============================================================================
// weft - Flags
// Call-context flags, queue-membership flags, and binding modes
// ============================================================================

use bitflags::bitflags;

bitflags! {
    /// Call-context flags threaded through every observation and lifecycle
    /// call chain. They describe *why* a call is happening so downstream
    /// code can pick the right branch (initial seed vs. change propagation,
    /// synchronous vs. queued target updates, and so on).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct LifecycleFlags: u16 {
        /// The call originates from a `bind` pass (initial target seed).
        const FROM_BIND = 1 << 0;
        /// The call originates from an `unbind` pass.
        const FROM_UNBIND = 1 << 1;
        /// The call runs inside a scheduler flush; updates apply directly.
        const FROM_FLUSH = 1 << 2;
        /// The call runs from a scheduled per-frame tick.
        const FROM_TICK = 1 << 3;
        /// The change should be written toward the binding target.
        const UPDATE_TARGET = 1 << 4;
        /// The change should be written back toward the binding source.
        const UPDATE_SOURCE = 1 << 5;
        /// A lifecycle batch is open; collection patches coalesce.
        const IN_BATCH = 1 << 6;
    }
}

bitflags! {
    /// Queue-membership bits carried by every lifecycle node. A node holds
    /// at most one bit per queue kind; the bit is set on enqueue and cleared
    /// together with removal from the queue's list.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct QueueFlags: u8 {
        const IN_BOUND = 1 << 0;
        const IN_UNBOUND = 1 << 1;
        const IN_ATTACHED = 1 << 2;
        const IN_DETACHED = 1 << 3;
        const IN_MOUNT = 1 << 4;
        const IN_UNMOUNT = 1 << 5;
        const IN_BATCH = 1 << 6;
    }
}

/// The direction(s) a property binding moves data in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingMode {
    /// Evaluate once on bind, never connect.
    OneTime,
    /// Source changes flow to the target.
    ToView,
    /// Target changes flow back to the source.
    FromView,
    /// Both directions.
    TwoWay,
}

impl BindingMode {
    /// Whether the binding subscribes to observers touched by the source
    /// expression.
    pub fn observes_source(self) -> bool {
        matches!(self, Self::ToView | Self::TwoWay)
    }

    /// Whether the binding subscribes to the target property observer.
    pub fn observes_target(self) -> bool {
        matches!(self, Self::FromView | Self::TwoWay)
    }

    /// Whether the binding seeds the target on bind.
    pub fn updates_target(self) -> bool {
        !matches!(self, Self::FromView)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_flags_are_distinct() {
        let all = [
            QueueFlags::IN_BOUND,
            QueueFlags::IN_UNBOUND,
            QueueFlags::IN_ATTACHED,
            QueueFlags::IN_DETACHED,
            QueueFlags::IN_MOUNT,
            QueueFlags::IN_UNMOUNT,
            QueueFlags::IN_BATCH,
        ];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert!((*a & *b).is_empty(), "bits {i} and {j} overlap");
                }
            }
        }
    }

    #[test]
    fn binding_mode_directions() {
        assert!(!BindingMode::OneTime.observes_source());
        assert!(BindingMode::OneTime.updates_target());

        assert!(BindingMode::ToView.observes_source());
        assert!(!BindingMode::ToView.observes_target());

        assert!(!BindingMode::FromView.observes_source());
        assert!(BindingMode::FromView.observes_target());
        assert!(!BindingMode::FromView.updates_target());

        assert!(BindingMode::TwoWay.observes_source());
        assert!(BindingMode::TwoWay.observes_target());
    }

    #[test]
    fn lifecycle_flags_compose() {
        let flags = LifecycleFlags::FROM_BIND | LifecycleFlags::UPDATE_TARGET;
        assert!(flags.contains(LifecycleFlags::FROM_BIND));
        assert!(!flags.contains(LifecycleFlags::FROM_FLUSH));
    }
}
