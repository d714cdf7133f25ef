//! Authentication session handling

pub mod context;
pub mod messages;

pub use context::{AuthState, SessionManager};
