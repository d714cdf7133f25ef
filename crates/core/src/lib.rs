//! Inkdesk core types: admin identity, route access rules and the token store

pub mod access;
pub mod error;
pub mod navigation;
pub mod store;

pub use access::{AuthSnapshot, GuardDecision, Permission, PermissionMap, Profile, Role, RouteMeta};
pub use error::{CoreError, CoreResult};
pub use navigation::{LoggingNavigator, Navigator, Redirect};
pub use store::{
    FileStorage, KeyValueStorage, MemoryStorage, Session, SessionEpoch, TokenStore,
};
