pub mod guard;
pub mod identity;
pub mod permissions;

pub use guard::{AuthSnapshot, GuardDecision, RouteMeta};
pub use identity::{PermissionMap, Profile, Role};
pub use permissions::Permission;
