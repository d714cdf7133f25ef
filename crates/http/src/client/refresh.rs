//! Silent access-token renewal
//!
//! A 401 on an ordinary request triggers one refresh call that carries the
//! refresh cookie. Concurrent callers share a single in-flight refresh: the
//! first caller starts it, later callers await the same future and all of them
//! observe the same outcome.

use super::error::RefreshError;
use crate::types::{AuthResponse, ErrorResponse};
use futures::future::{BoxFuture, FutureExt, Shared};
use inkdesk_core::{Navigator, Redirect, Session, SessionEpoch, TokenStore};
use reqwest::Client;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Refresh endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "/auth/refresh";

type RefreshFlight = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Coalesces token refreshes into at most one request at a time
pub struct RefreshCoordinator {
    client: Client,
    refresh_url: String,
    store: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    in_flight: Mutex<Option<RefreshFlight>>,
}

impl RefreshCoordinator {
    pub fn new(
        client: Client,
        base_url: &str,
        store: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            client,
            refresh_url: format!("{base_url}{REFRESH_PATH}"),
            store,
            navigator,
            in_flight: Mutex::new(None),
        }
    }

    /// Obtain a usable access token after `rejected` was answered with 401.
    ///
    /// If the store already holds a different token, a concurrent refresh (or
    /// a fresh login) has replaced the rejected one and it is returned as is.
    /// Otherwise the caller joins, or starts, the shared refresh.
    ///
    /// On failure the store has been cleared and a login redirect issued.
    pub async fn refresh(&self, rejected: Option<&str>) -> Result<String, RefreshError> {
        if let Some(current) = self.store.access_token()
            && rejected != Some(current.as_str())
        {
            debug!("Rejected token already replaced; reusing current token");
            return Ok(current);
        }

        let flight = self.join_or_start();
        let outcome = flight.clone().await;
        self.finish(&flight);
        outcome
    }

    /// Whether a refresh is currently running
    pub fn is_refreshing(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<RefreshFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_or_start(&self) -> RefreshFlight {
        let mut slot = self.slot();
        if let Some(flight) = slot.as_ref() {
            debug!("Joining in-flight session refresh");
            return flight.clone();
        }

        let flight = run_refresh(
            self.client.clone(),
            self.refresh_url.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.navigator),
        )
        .boxed()
        .shared();
        *slot = Some(flight.clone());
        flight
    }

    fn finish(&self, flight: &RefreshFlight) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(flight)) {
            *slot = None;
        }
    }
}

async fn run_refresh(
    client: Client,
    url: String,
    store: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
) -> Result<String, RefreshError> {
    let epoch = store.epoch();
    debug!("Refreshing session");

    let session = match request_session(&client, &url).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Session refresh failed: {e}");
            end_session(&store, &epoch, navigator.as_ref());
            return Err(e);
        }
    };

    let token = session.access_token.clone();
    match store.replace_if_current(&epoch, session) {
        Ok(true) => {
            info!("Access token refreshed");
            Ok(token)
        }
        Ok(false) => Err(RefreshError::SessionEnded),
        Err(e) => {
            warn!("Failed to persist refreshed session: {e}");
            end_session(&store, &epoch, navigator.as_ref());
            Err(RefreshError::Storage(e.to_string()))
        }
    }
}

/// Force a logout for the session the refresh belonged to. A login or
/// logout that happened meanwhile owns the store and is left alone.
fn end_session(store: &TokenStore, epoch: &SessionEpoch, navigator: &dyn Navigator) {
    if store.clear_if_current(epoch) {
        navigator.navigate(Redirect::login(None));
    } else {
        debug!("Session changed during refresh; not forcing logout");
    }
}

async fn request_session(client: &Client, url: &str) -> Result<Session, RefreshError> {
    let response = client
        .post(url)
        .send()
        .await
        .map_err(|e| RefreshError::Network(e.to_string()))?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.text().map(str::to_string))
            .unwrap_or_else(|| status.to_string());
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let auth: AuthResponse = response
        .json()
        .await
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
    Ok(Session::new(auth.access_token, auth.admin))
}
