//! Authentication and profile API client methods

use super::{ApiClient, ClientError, Interception};
use crate::types::{
    AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MeResponse,
    MessageResponse, ProfileResponse, ProfileUpdate, ResetPasswordRequest,
};
use inkdesk_core::Profile;
use reqwest::Method;

impl ApiClient {
    /// Exchange credentials for an access token; the server also sets the
    /// refresh cookie
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let req = self.request(Method::POST, "/auth/login").json(credentials);
        self.execute_with(req, Interception::Passthrough).await
    }

    /// Invalidate the session server-side
    pub async fn logout(&self) -> Result<(), ClientError> {
        let req = self.request(Method::POST, "/auth/logout");
        self.execute_empty(req, Interception::Passthrough).await
    }

    /// Profile of the admin owning the current access token
    pub async fn me(&self) -> Result<Profile, ClientError> {
        let req = self.request(Method::GET, "/auth/me");
        let response: MeResponse = self.execute(req).await?;
        Ok(response.admin)
    }

    /// Request a password reset e-mail
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let req = self
            .request(Method::POST, "/auth/forgot-password")
            .json(&ForgotPasswordRequest {
                email: email.to_string(),
            });
        self.execute_message(req, Interception::Passthrough).await
    }

    /// Set a new password using the token from a reset e-mail
    pub async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<MessageResponse, ClientError> {
        let req = self
            .request(Method::POST, "/auth/reset-password")
            .json(request);
        self.execute_message(req, Interception::Passthrough).await
    }

    /// Update the current admin's own profile
    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> Result<ProfileResponse, ClientError> {
        let req = self.request(Method::PUT, "/admins/profile").json(update);
        self.execute(req).await
    }

    /// Change the current admin's password
    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<MessageResponse, ClientError> {
        let req = self
            .request(Method::PUT, "/admins/change-password")
            .json(request);
        self.execute_message(req, Interception::Refresh).await
    }

    /// Acknowledgement endpoints may answer with an empty body
    async fn execute_message(
        &self,
        request: reqwest::RequestBuilder,
        interception: Interception,
    ) -> Result<MessageResponse, ClientError> {
        let response = self.dispatch(request, interception).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(MessageResponse::default());
        }
        Ok(serde_json::from_str(&body)?)
    }
}
