//! Session state owner for the admin back office

use super::messages;
use crate::config::AdminConfig;
use crate::error::AdminError;
use crate::notify::Notifier;
use crate::routes;
use inkdesk_core::{
    AuthSnapshot, FileStorage, GuardDecision, Navigator, Profile, RouteMeta, Session, TokenStore,
};
use inkdesk_http::types::{ChangePasswordRequest, LoginRequest, ProfileUpdate, ResetPasswordRequest};
use inkdesk_http::{ApiClient, ClientError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Externally visible authentication state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "admin", rename_all = "snake_case")]
pub enum AuthState {
    Loading,
    Authenticated(Profile),
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Owns the admin session: restores it at startup, performs login, logout
/// and self-service account operations, and announces outcomes through a
/// [`Notifier`].
///
/// Construct once and share behind an `Arc`.
pub struct SessionManager {
    client: ApiClient,
    notifier: Notifier,
    loading: LoadingState,
}

impl SessionManager {
    pub fn new(client: ApiClient) -> Self {
        Self::with_notifier(client, Notifier::default())
    }

    pub fn with_notifier(client: ApiClient, notifier: Notifier) -> Self {
        Self {
            client,
            notifier,
            loading: LoadingState::new(),
        }
    }

    /// Build a manager whose session persists in the configured data directory
    pub fn from_config(config: &AdminConfig, navigator: Arc<dyn Navigator>) -> Result<Self, AdminError> {
        let storage = FileStorage::new(config.session_path());
        let store = TokenStore::new(Arc::new(storage));
        let client = ApiClient::builder()
            .base_url(&config.api_url)
            .store(Arc::new(store))
            .navigator(navigator)
            .timeout(config.timeout())
            .build()?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn store(&self) -> &TokenStore {
        self.client.store()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    /// Authentication follows the held profile; there is no separate flag
    pub fn is_authenticated(&self) -> bool {
        self.store().has_session()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.store().profile()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            is_loading: self.is_loading(),
            profile: self.profile(),
        }
    }

    pub fn state(&self) -> AuthState {
        if self.is_loading() {
            return AuthState::Loading;
        }
        match self.profile() {
            Some(profile) => AuthState::Authenticated(profile),
            None => AuthState::Unauthenticated,
        }
    }

    /// Guard decision for showing `route` at `requested`
    pub fn guard(&self, route: &RouteMeta, requested: &str) -> GuardDecision {
        GuardDecision::evaluate(&self.snapshot(), route, requested)
    }

    /// Guard decision for a location, or `None` when no route owns it
    pub fn check(&self, location: &str) -> Option<GuardDecision> {
        routes::find(location).map(|route| self.guard(route, location))
    }

    /// Restore the persisted session and confirm it with the server.
    ///
    /// A stored session the server no longer accepts is discarded. Without a
    /// stored session no request is made.
    pub async fn initialize(&self) -> AuthState {
        {
            let _loading = self.loading.begin();
            self.restore().await;
            self.loading.settle();
        }
        let state = self.state();
        debug!(?state, "Session initialized");
        state
    }

    async fn restore(&self) {
        let store = self.store();
        let restored = match store.load() {
            Ok(restored) => restored,
            Err(e) => {
                warn!("Failed to read stored session: {e}");
                store.clear();
                None
            }
        };
        if restored.is_none() {
            return;
        }

        match self.client.me().await {
            Ok(profile) => match store.update_profile(profile) {
                Ok(true) => info!("Stored session confirmed"),
                Ok(false) => debug!("Session ended while it was being confirmed"),
                Err(e) => {
                    warn!("Failed to store confirmed profile: {e}");
                    store.clear();
                }
            },
            Err(e) => {
                info!("Stored session rejected: {e}");
                store.clear();
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Profile, ClientError> {
        let result = {
            let _loading = self.loading.begin();
            let result = self.try_login(email, password).await;
            self.loading.settle();
            result
        };

        match &result {
            Ok(profile) => {
                info!(admin_id = %profile.id, role = %profile.role, "Logged in");
                self.notifier.success(messages::LOGIN_SUCCEEDED);
            }
            Err(e) => {
                warn!("Login failed: {e}");
                self.store().clear();
                self.notifier
                    .error(messages::describe(e, messages::LOGIN_FAILED));
            }
        }
        result
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<Profile, ClientError> {
        let store = self.store();
        let epoch = store.epoch();
        let response = self
            .client
            .login(&LoginRequest::new(email, password))
            .await?;
        let admin = response.admin.clone();
        if !store.start(&epoch, Session::new(response.access_token, response.admin))? {
            return Err(ClientError::Cancelled);
        }
        Ok(admin)
    }

    /// End the session. The server is told on a best-effort basis; the local
    /// session is always cleared.
    pub async fn logout(&self) {
        {
            let _loading = self.loading.begin();
            if let Err(e) = self.client.logout().await {
                warn!("Logout request failed: {e}");
            }
            self.store().clear();
            self.loading.settle();
        }
        info!("Logged out");
        self.notifier.success(messages::LOGGED_OUT);
    }

    /// Save name/email changes and merge the server's view of the profile
    /// into the held one
    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> Result<Profile, ClientError> {
        let result = self.try_update_profile(update).await;
        self.report(
            result.as_ref().map(|(_, message)| message.as_deref()),
            messages::PROFILE_UPDATED,
            messages::PROFILE_UPDATE_FAILED,
        );
        result.map(|(profile, _)| profile)
    }

    async fn try_update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> Result<(Profile, Option<String>), ClientError> {
        let response = self.client.update_profile(update).await?;
        let Some(mut profile) = self.profile() else {
            return Err(ClientError::Cancelled);
        };
        match &response.admin {
            Some(admin) => profile.merge(admin),
            None => update.apply(&mut profile),
        }
        if !self.store().update_profile(profile.clone())? {
            return Err(ClientError::Cancelled);
        }
        debug!(admin_id = %profile.id, "Profile updated");
        Ok((profile, response.message))
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let request = ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        };
        let result = self.client.change_password(&request).await;
        self.report(
            result.as_ref().map(|r| r.message.as_deref()),
            messages::PASSWORD_CHANGED,
            messages::PASSWORD_CHANGE_FAILED,
        );
        result.map(|_| ())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ClientError> {
        let result = self.client.forgot_password(email).await;
        self.report(
            result.as_ref().map(|r| r.message.as_deref()),
            messages::RESET_EMAIL_SENT,
            messages::RESET_EMAIL_FAILED,
        );
        result.map(|_| ())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let request = ResetPasswordRequest {
            token: token.to_string(),
            new_password: new_password.to_string(),
        };
        let result = self.client.reset_password(&request).await;
        self.report(
            result.as_ref().map(|r| r.message.as_deref()),
            messages::PASSWORD_RESET,
            messages::PASSWORD_RESET_FAILED,
        );
        result.map(|_| ())
    }

    /// Notify the outcome of an operation, preferring server-provided text
    fn report(
        &self,
        outcome: Result<Option<&str>, &ClientError>,
        success: &str,
        failure: &str,
    ) {
        match outcome {
            Ok(message) => self
                .notifier
                .success(message.filter(|m| !m.trim().is_empty()).unwrap_or(success)),
            Err(e) => {
                debug!("Operation failed: {e}");
                self.notifier.error(messages::describe(e, failure));
            }
        }
    }
}

/// Count of operations that make the auth state indeterminate
///
/// Starts out loading until the first initialize, login or logout settles it.
struct LoadingState {
    pending: Mutex<usize>,
    unsettled: AtomicBool,
}

impl LoadingState {
    fn new() -> Self {
        Self {
            pending: Mutex::new(1),
            unsettled: AtomicBool::new(true),
        }
    }

    fn is_loading(&self) -> bool {
        *self.lock() > 0
    }

    fn begin(&self) -> LoadingGuard<'_> {
        *self.lock() += 1;
        LoadingGuard { state: self }
    }

    /// Drop the startup hold; later calls do nothing
    fn settle(&self) {
        if self.unsettled.swap(false, Ordering::SeqCst) {
            self.release();
        }
    }

    fn release(&self) {
        let mut pending = self.lock();
        *pending = pending.saturating_sub(1);
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct LoadingGuard<'a> {
    state: &'a LoadingState,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.release();
    }
}
