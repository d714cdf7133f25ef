//! Persistent token store
//!
//! The store owns the current [`Session`]: an in-memory mirror published on a
//! `watch` channel, written through to a [`KeyValueStorage`] backend under a
//! single lock. The access token and the serialized profile live under two
//! keys and are always written and cleared together.
//!
//! Every session epoch carries a [`CancellationToken`]. Clearing the store
//! cancels it, which lets in-flight requests from the old session resolve
//! without touching the new state.

use crate::access::Profile;
use crate::error::CoreResult;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Storage key holding the bearer token
pub const ACCESS_TOKEN_KEY: &str = "adminToken";

/// Storage key holding the serialized profile
pub const PROFILE_KEY: &str = "adminUser";

/// Storage key holding the API cookies (the refresh cookie among them)
pub const COOKIES_KEY: &str = "adminCookies";

/// String key-value persistence, shaped like browser storage
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> CoreResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> CoreResult<()>;
    fn remove_item(&self, key: &str) -> CoreResult<()>;
}

/// Process-local storage; contents are lost on exit
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> CoreResult<()> {
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> CoreResult<()> {
        self.items().remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object on disk
///
/// Writes go to a sibling temp file and are renamed into place.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> CoreResult<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, items: &HashMap<String, String>) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;

        // Credentials: owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> CoreResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.read_all()?;
        f(&mut items);
        self.write_all(&items)
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> CoreResult<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> CoreResult<()> {
        self.modify(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> CoreResult<()> {
        self.modify(|items| {
            items.remove(key);
        })
    }
}

/// Access token plus the profile it belongs to
#[derive(Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub admin: Profile,
}

impl Session {
    pub fn new(access_token: impl Into<String>, admin: Profile) -> Self {
        Self {
            access_token: access_token.into(),
            admin,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("admin", &self.admin)
            .finish()
    }
}

/// Identifies the session a piece of work was started under
#[derive(Debug, Clone)]
pub struct SessionEpoch {
    generation: u64,
    cancel: CancellationToken,
}

impl SessionEpoch {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancelled once the store is cleared
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug)]
struct EpochState {
    generation: u64,
    cancel: CancellationToken,
}

/// Single source of truth for the current session
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    epoch: Mutex<EpochState>,
    current: watch::Sender<Option<Session>>,
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("session", &*self.current.borrow())
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Create an empty store over `storage`. Call [`TokenStore::load`] to
    /// pick up a previously persisted session.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            storage,
            epoch: Mutex::new(EpochState {
                generation: 0,
                cancel: CancellationToken::new(),
            }),
            current,
        }
    }

    /// Store backed by [`MemoryStorage`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Backend the session is persisted in
    pub fn storage(&self) -> &Arc<dyn KeyValueStorage> {
        &self.storage
    }

    fn lock(&self) -> MutexGuard<'_, EpochState> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hydrate the mirror from storage.
    ///
    /// A half-written pair (token without profile, or an unreadable profile)
    /// is removed from storage and treated as no session.
    pub fn load(&self) -> CoreResult<Option<Session>> {
        let _guard = self.lock();
        let token = self.storage.get_item(ACCESS_TOKEN_KEY)?;
        let profile = self.storage.get_item(PROFILE_KEY)?;

        let session = match (token, profile) {
            (Some(token), Some(profile)) => match serde_json::from_str::<Profile>(&profile) {
                Ok(admin) => Some(Session::new(token, admin)),
                Err(e) => {
                    warn!("Discarding stored session with unreadable profile: {e}");
                    self.remove_all();
                    None
                }
            },
            (None, None) => None,
            _ => {
                warn!("Discarding half-written stored session");
                self.remove_all();
                None
            }
        };

        if let Some(session) = &session {
            debug!(admin_id = %session.admin.id, "Loaded stored session");
        }
        self.current.send_replace(session.clone());
        Ok(session)
    }

    pub fn current(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub fn profile(&self) -> Option<Profile> {
        self.current.borrow().as_ref().map(|s| s.admin.clone())
    }

    pub fn has_session(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Receiver notified on every session change
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    pub fn epoch(&self) -> SessionEpoch {
        let state = self.lock();
        SessionEpoch {
            generation: state.generation,
            cancel: state.cancel.clone(),
        }
    }

    /// Begin a new session (login) unless `epoch` was cancelled by a clear in
    /// the meantime. Supersedes any work tied to the previous generation.
    pub fn start(&self, epoch: &SessionEpoch, session: Session) -> CoreResult<bool> {
        let mut state = self.lock();
        if epoch.is_cancelled() {
            debug!("Not starting session from a cancelled epoch");
            return Ok(false);
        }
        self.persist(&session)?;
        state.generation += 1;
        info!(admin_id = %session.admin.id, "Session started");
        self.current.send_replace(Some(session));
        Ok(true)
    }

    /// Replace the session only if no login or logout happened since `epoch`
    /// was taken. Returns whether the write happened.
    pub fn replace_if_current(&self, epoch: &SessionEpoch, session: Session) -> CoreResult<bool> {
        let state = self.lock();
        if state.generation != epoch.generation || state.cancel.is_cancelled() {
            debug!("Dropping session update from a superseded epoch");
            return Ok(false);
        }
        self.persist(&session)?;
        self.current.send_replace(Some(session));
        Ok(true)
    }

    /// Overwrite the profile of the current session. Returns `false` when
    /// there is no session.
    pub fn update_profile(&self, admin: Profile) -> CoreResult<bool> {
        let _guard = self.lock();
        let Some(token) = self.access_token() else {
            return Ok(false);
        };
        let serialized = serde_json::to_string(&admin)?;
        self.storage.set_item(PROFILE_KEY, &serialized)?;
        self.current.send_replace(Some(Session::new(token, admin)));
        Ok(true)
    }

    /// Drop the session from memory and storage and cancel its epoch.
    ///
    /// Always succeeds locally; storage failures are logged.
    pub fn clear(&self) {
        let mut state = self.lock();
        self.clear_locked(&mut state);
    }

    /// Clear only if no login or logout happened since `epoch` was taken.
    /// Returns whether the session was cleared.
    pub fn clear_if_current(&self, epoch: &SessionEpoch) -> bool {
        let mut state = self.lock();
        if state.generation != epoch.generation || state.cancel.is_cancelled() {
            debug!("Not clearing a session that superseded the epoch");
            return false;
        }
        self.clear_locked(&mut state);
        true
    }

    fn clear_locked(&self, state: &mut EpochState) {
        self.remove_all();
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        state.generation += 1;
        let had_session = self.current.send_replace(None).is_some();
        if had_session {
            info!("Session cleared");
        }
    }

    fn persist(&self, session: &Session) -> CoreResult<()> {
        let profile = serde_json::to_string(&session.admin)?;
        self.storage
            .set_item(ACCESS_TOKEN_KEY, &session.access_token)?;
        if let Err(e) = self.storage.set_item(PROFILE_KEY, &profile) {
            // Never leave a token without its profile
            if let Err(cleanup) = self.storage.remove_item(ACCESS_TOKEN_KEY) {
                warn!("Failed to roll back token after profile write error: {cleanup}");
            }
            return Err(e);
        }
        Ok(())
    }

    fn remove_all(&self) {
        for key in [ACCESS_TOKEN_KEY, PROFILE_KEY, COOKIES_KEY] {
            if let Err(e) = self.storage.remove_item(key) {
                warn!(key, "Failed to remove stored session item: {e}");
            }
        }
    }
}
