//! User-facing messages for session operations

use inkdesk_http::ClientError;

pub const LOGIN_SUCCEEDED: &str = "Login successful";
pub const LOGIN_FAILED: &str = "Login failed";
pub const LOGGED_OUT: &str = "Logged out successfully";
pub const PROFILE_UPDATED: &str = "Profile updated successfully";
pub const PROFILE_UPDATE_FAILED: &str = "Failed to update profile";
pub const PASSWORD_CHANGED: &str = "Password changed successfully";
pub const PASSWORD_CHANGE_FAILED: &str = "Failed to change password";
pub const RESET_EMAIL_SENT: &str = "Password reset email sent";
pub const RESET_EMAIL_FAILED: &str = "Failed to send reset email";
pub const PASSWORD_RESET: &str = "Password reset successfully";
pub const PASSWORD_RESET_FAILED: &str = "Failed to reset password";
pub const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";
pub const SERVER_UNREACHABLE: &str = "Unable to reach the server";

/// Text to show for `error`, falling back to `fallback` when the server gave
/// nothing usable
pub fn describe(error: &ClientError, fallback: &str) -> String {
    match error {
        ClientError::Validation { message, errors, .. } => {
            if errors.is_empty() {
                return message.clone();
            }
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        }
        ClientError::Refresh(_) | ClientError::Cancelled => SESSION_EXPIRED.to_string(),
        ClientError::Request(e) if e.is_connect() || e.is_timeout() => {
            SERVER_UNREACHABLE.to_string()
        }
        other => other
            .server_message()
            .map_or_else(|| fallback.to_string(), str::to_string),
    }
}
