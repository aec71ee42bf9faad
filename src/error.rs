// ============================================================================
// weft - Errors
// Crate-wide error taxonomy and Result alias
// ============================================================================

use thiserror::Error;

use crate::core::flags::{BindingMode, LifecycleFlags};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the observation and binding layers.
///
/// Failures that occur inside an infallible notification callback (a queue
/// drain, an observer fan-out) are fatal programming errors and panic with
/// the formatted error instead; see the propagation notes on
/// [`crate::binding::PropertyBinding`] and [`crate::lifecycle::Lifecycle`].
#[derive(Debug, Error)]
pub enum Error {
    /// The property was sealed against observation. Surfaced instead of a
    /// silent dirty-checking fallback, which would hide real bugs.
    #[error("property '{property}' is sealed and cannot be instrumented for observation")]
    NonConfigurable { property: String },

    /// A binding entered a mode/flag combination that matches no known
    /// branch. Thrown rather than silently ignored, since silent handling
    /// would mask a disallowed state transition.
    #[error("no binding branch matches mode {mode:?} under flags {flags:?}")]
    UnknownMode {
        mode: BindingMode,
        flags: LifecycleFlags,
    },

    /// A lifecycle queue found its own bookkeeping corrupted mid-drain.
    #[error("lifecycle queue '{queue}' corrupted mid-drain")]
    ReentrancyViolation { queue: &'static str },
}
