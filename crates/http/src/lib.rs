//! Inkdesk HTTP client
//!
//! Talks to the admin REST API on behalf of a single admin session: bearer
//! credentials come from the shared token store, expired tokens are renewed
//! through the refresh cookie, and cleared sessions cancel their in-flight
//! requests.

pub mod client;
pub mod types;

pub use client::error::{ClientError, RefreshError};
pub use client::refresh::RefreshCoordinator;
pub use client::{ApiClient, ApiClientBuilder, Interception};

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;
