//! Admin back-office session layer: session lifecycle, route access and
//! user notifications on top of the `inkdesk-http` client.

pub mod auth;
pub mod config;
pub mod error;
pub mod notify;
pub mod routes;

pub use auth::{AuthState, SessionManager};
pub use config::AdminConfig;
pub use error::{AdminError, Result};
pub use notify::{Notification, NotificationLevel, Notifier};
