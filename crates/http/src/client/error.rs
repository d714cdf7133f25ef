//! Client error types

use crate::types::{ErrorResponse, FieldError};
use inkdesk_core::CoreError;
use thiserror::Error;

/// Why a silent token refresh failed
///
/// Cloneable so one refresh outcome can be handed to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// The refresh endpoint answered with a non-success status
    #[error("Session refresh rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The refresh request never got a response
    #[error("Session refresh failed: {0}")]
    Network(String),

    /// The refresh endpoint answered 2xx with an unusable body
    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    /// A logout or new login happened while the refresh was in flight
    #[error("Session ended while refreshing")]
    SessionEnded,

    /// The new session could not be persisted
    #[error("Failed to store refreshed session: {0}")]
    Storage(String),
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request rejected with a field-by-field error list
    #[error("Validation failed: {message}")]
    Validation {
        status: u16,
        message: String,
        errors: Vec<FieldError>,
    },

    /// The access token expired and could not be renewed
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// The session the request belonged to was cleared before it finished
    #[error("Request cancelled: session ended")]
    Cancelled,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Session storage failed
    #[error("Session storage error: {0}")]
    Storage(#[from] CoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Map an error response body, keeping a structured error list when the
    /// server sent one
    pub fn from_body(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
        let message = parsed
            .as_ref()
            .and_then(ErrorResponse::text)
            .map(str::to_string)
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() || trimmed.starts_with('{') {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                } else {
                    trimmed.to_string()
                }
            });

        match parsed {
            Some(parsed)
                if !parsed.errors.is_empty()
                    && matches!(status.as_u16(), 400 | 422) =>
            {
                Self::Validation {
                    status: status.as_u16(),
                    message,
                    errors: parsed.errors,
                }
            }
            _ => Self::from_status(status, message),
        }
    }

    /// HTTP status the server answered with, if the error came from one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::AuthenticationFailed(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::ServerError { status, .. } | Self::Validation { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Message provided by the server, suitable for showing to a user
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::BadRequest(m)
            | Self::AuthenticationFailed(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::ServerError { message: m, .. }
            | Self::Validation { message: m, .. } => Some(m.as_str()),
            Self::Refresh(RefreshError::Rejected { message, .. }) => Some(message.as_str()),
            _ => None,
        }
    }

    /// Field errors of a validation failure
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Whether the session is gone and the user must log in again
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Refresh(_) | Self::Cancelled)
    }
}
