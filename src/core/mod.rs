// ============================================================================
// weft - Core
// Shared primitives: values, flags, the host contract, the runtime handle
// ============================================================================

pub mod flags;
pub mod platform;
pub mod runtime;
pub mod value;

pub use flags::{BindingMode, LifecycleFlags, QueueFlags};
pub use platform::{HostPlatform, VirtualPlatform};
pub use runtime::Runtime;
pub use value::Value;
