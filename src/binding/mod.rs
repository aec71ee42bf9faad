// ============================================================================
// weft - Binding
// Scopes, expressions, and the connectable property binding
// ============================================================================

pub mod connectable;
pub mod expression;
pub mod scope;

pub use connectable::PropertyBinding;
pub use expression::{AccessMember, AccessScope, Connectable, Expression};
pub use scope::{OverrideContext, Resolved, Scope};
