//! Session context: token pair, current user and the logged-out signal
//!
//! One [`Session`] is shared by `Arc` between the client, the boards and the
//! notification poller. Tokens persist through a [`TokenStore`] so a CLI
//! invocation can pick up where the last one left off.

use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;

use medivault_core::User;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, MutexGuard, RwLock};

use crate::error::ApiError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Body returned by `POST /auth/refresh/`; rotation is optional
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<TokenPair>, ApiError>;
    fn save(&self, tokens: &TokenPair) -> Result<(), ApiError>;
    fn clear(&self) -> Result<(), ApiError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: StdMutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: StdMutex::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenPair>, ApiError> {
        Ok(self.tokens.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), ApiError> {
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner()) = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ApiError> {
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// Tokens kept as JSON on disk
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenPair>, ApiError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ApiError::Config(format!("Failed to read token file {:?}: {}", self.path, e)))?;
        match serde_json::from_str(&content) {
            Ok(tokens) => {
                log::debug!("Loaded tokens from {:?}", self.path);
                Ok(Some(tokens))
            }
            Err(e) => {
                log::warn!("Ignoring unreadable token file {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApiError::Config(format!("Failed to create {:?}: {}", parent, e)))?;
        }
        let json = serde_json::to_string_pretty(tokens)
            .map_err(|e| ApiError::Config(format!("Failed to encode tokens: {}", e)))?;
        write_private(&self.path, json.as_bytes())
            .map_err(|e| ApiError::Config(format!("Failed to write token file {:?}: {}", self.path, e)))?;
        log::debug!("Saved tokens to {:?}", self.path);
        Ok(())
    }

    fn clear(&self) -> Result<(), ApiError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| ApiError::Config(format!("Failed to delete token file {:?}: {}", self.path, e)))?;
            log::debug!("Deleted token file {:?}", self.path);
        }
        Ok(())
    }
}

/// Write `contents`, readable by the owner only on unix
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);

    let mut file = options.open(path)?;
    // The open mode only applies to new files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    LoggedIn,
    LoggedOut,
}

pub struct Session {
    tokens: RwLock<Option<TokenPair>>,
    user: RwLock<Option<User>>,
    refresh_lock: Mutex<()>,
    store: Box<dyn TokenStore>,
    state: watch::Sender<SessionState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session seeded from whatever `store` holds
    pub fn new(store: Box<dyn TokenStore>) -> Self {
        let tokens = match store.load() {
            Ok(tokens) => tokens,
            Err(e) => {
                log::warn!("Failed to load saved tokens: {}", e);
                None
            }
        };
        let initial = if tokens.is_some() {
            SessionState::LoggedIn
        } else {
            SessionState::LoggedOut
        };
        let (state, _) = watch::channel(initial);
        Self {
            tokens: RwLock::new(tokens),
            user: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            store,
            state,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryTokenStore::new()))
    }

    /// Log in: persist the pair, remember the user, announce LoggedIn
    pub async fn establish(&self, tokens: TokenPair, user: Option<User>) {
        if let Err(e) = self.store.save(&tokens) {
            log::warn!("Failed to persist tokens: {}", e);
        }
        *self.tokens.write().await = Some(tokens);
        *self.user.write().await = user;
        self.state.send_replace(SessionState::LoggedIn);
    }

    /// Log out: clear the store and the user, announce LoggedOut
    pub async fn teardown(&self) {
        if let Err(e) = self.store.clear() {
            log::warn!("Failed to clear token store: {}", e);
        }
        *self.tokens.write().await = None;
        *self.user.write().await = None;
        if self.state.send_replace(SessionState::LoggedOut) == SessionState::LoggedIn {
            log::info!("Session ended");
        }
    }

    pub async fn set_user(&self, user: User) {
        *self.user.write().await = Some(user);
    }

    pub async fn user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    pub async fn tokens(&self) -> Option<TokenPair> {
        self.tokens.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.access.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.refresh.clone())
    }

    /// Store a refreshed access token, keeping the old refresh token unless rotated
    pub async fn apply_refresh(&self, refreshed: RefreshedTokens) -> Option<TokenPair> {
        let mut guard = self.tokens.write().await;
        let current = guard.as_mut()?;
        current.access = refreshed.access;
        if let Some(refresh) = refreshed.refresh {
            current.refresh = refresh;
        }
        let updated = current.clone();
        drop(guard);
        if let Err(e) = self.store.save(&updated) {
            log::warn!("Failed to persist refreshed tokens: {}", e);
        }
        Some(updated)
    }

    /// Held while exchanging the refresh token so concurrent 401s share one refresh
    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock.lock().await
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == SessionState::LoggedIn
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}
