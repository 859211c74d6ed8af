//! Token lifecycle manager
//!
//! Owns the authentication state machine, the current token pair, the
//! scheduled refresh timer, and state-change notification. Refreshes are
//! single-flight: concurrent callers share one in-flight future instead of
//! issuing duplicate network calls.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::task::JoinHandle;

use super::state::{AuthState, AuthStateChange};
use super::storage::TokenStorage;
use super::tokens::AuthTokens;
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Exchanges a refresh token for a new token pair.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Perform the exchange. The refresh token passed in is the one currently
    /// held by the manager.
    async fn refresh(&self, refresh_token: String) -> Result<AuthTokens>;
}

/// Handle returned by [`TokenManager::add_state_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Options for constructing a [`TokenManager`].
pub struct TokenManagerOptions {
    /// Durable storage for the serialized token pair
    pub storage: Arc<dyn TokenStorage>,
    /// Key prefix for the storage record
    pub storage_prefix: String,
    /// Whether to schedule a refresh timer when tokens are set
    pub auto_refresh: bool,
    /// How long before access-token expiry the timer fires
    pub refresh_threshold: Duration,
}

impl TokenManagerOptions {
    /// Create options with defaults taken from the client configuration.
    pub fn from_config(config: &ClientConfig, storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            storage,
            storage_prefix: config.storage_prefix.clone(),
            auto_refresh: config.auto_refresh,
            refresh_threshold: config.refresh_threshold,
        }
    }
}

type ListenerFn = dyn Fn(&AuthStateChange) + Send + Sync;
type SharedRefresh = Shared<BoxFuture<'static, std::result::Result<AuthTokens, Arc<Error>>>>;

struct Session {
    state: AuthState,
    tokens: Option<AuthTokens>,
}

struct ManagerInner {
    storage: Arc<dyn TokenStorage>,
    storage_key: String,
    auto_refresh: bool,
    refresh_threshold: Duration,
    session: RwLock<Session>,
    listeners: Mutex<Vec<(u64, Arc<ListenerFn>)>>,
    next_listener_id: AtomicU64,
    inflight: Mutex<Option<SharedRefresh>>,
    refresh_timer: Mutex<Option<JoinHandle<()>>>,
}

/// Authentication state machine and token holder.
///
/// Cheap to clone; all clones share the same state. State transitions and
/// listener notifications are strictly ordered per instance as long as callers
/// await the async operations; concurrent unawaited `set_tokens`/`clear_tokens`
/// calls are last-write-wins and are the caller's responsibility. Refreshes
/// are serialized by the single-flight guard regardless.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<ManagerInner>,
}

impl TokenManager {
    /// Create a manager, importing any still-usable session from storage.
    ///
    /// A stored pair whose refresh token is unexpired is imported and the
    /// state becomes [`AuthState::Authenticated`]; anything else (absent,
    /// undeserializable, or fully expired) is discarded.
    pub async fn new(options: TokenManagerOptions) -> Self {
        let inner = Arc::new(ManagerInner {
            storage: options.storage,
            storage_key: format!("{}tokens", options.storage_prefix),
            auto_refresh: options.auto_refresh,
            refresh_threshold: options.refresh_threshold,
            session: RwLock::new(Session {
                state: AuthState::Unauthenticated,
                tokens: None,
            }),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            inflight: Mutex::new(None),
            refresh_timer: Mutex::new(None),
        });
        inner.import_stored_session().await;
        Self { inner }
    }

    /// The current token pair, if any.
    pub fn tokens(&self) -> Option<AuthTokens> {
        self.inner.session().tokens.clone()
    }

    /// The current authentication state.
    pub fn state(&self) -> AuthState {
        self.inner.session().state
    }

    /// Whether a session is currently held.
    ///
    /// Remains true past access-token expiry until an explicit refresh
    /// failure, timer expiry, or logout changes the state.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.state(),
            AuthState::Authenticated | AuthState::Refreshing
        )
    }

    /// Whether the access token has expired while the refresh token is usable.
    pub fn needs_refresh(&self) -> bool {
        self.tokens().is_some_and(|t| t.needs_refresh())
    }

    /// Store a new token pair.
    ///
    /// Persists the pair, transitions to [`AuthState::Authenticated`],
    /// (re)schedules the auto-refresh timer, and notifies listeners.
    pub async fn set_tokens(&self, tokens: AuthTokens) -> Result<()> {
        self.inner.apply_tokens(tokens).await
    }

    /// Drop the session (logout).
    ///
    /// Clears memory and storage, cancels the refresh timer, transitions to
    /// [`AuthState::Unauthenticated`], and notifies listeners.
    pub async fn clear_tokens(&self) -> Result<()> {
        self.inner.cancel_timer();
        self.inner.clear_tokens_from_storage().await?;
        let previous = {
            let mut session = self.inner.session_mut();
            let previous = session.state;
            session.tokens = None;
            session.state = AuthState::Unauthenticated;
            previous
        };
        tracing::debug!(?previous, "session cleared");
        self.inner.notify(AuthStateChange {
            previous,
            current: AuthState::Unauthenticated,
            tokens: None,
            error: None,
        });
        Ok(())
    }

    /// Refresh the token pair, sharing one in-flight refresh among concurrent
    /// callers.
    ///
    /// Requires a held session ([`Error::NotAuthenticated`] otherwise, with no
    /// state change). Transitions to [`AuthState::Refreshing`] and invokes
    /// `refresh_fn` with the current refresh token. On success the new pair
    /// re-enters through [`TokenManager::set_tokens`]; on failure the session
    /// moves to [`AuthState::Expired`] with memory and storage cleared, and
    /// every waiting caller receives [`Error::Refresh`] wrapping the same
    /// cause. The in-flight slot is released whatever the outcome.
    pub async fn refresh_tokens<F, Fut>(&self, refresh_fn: F) -> Result<AuthTokens>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<AuthTokens>> + Send + 'static,
    {
        let shared = {
            let mut inflight = self
                .inner
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match inflight.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let refresh_token = match self.inner.session().tokens.as_ref() {
                        Some(tokens) => tokens.refresh().to_string(),
                        None => return Err(Error::NotAuthenticated),
                    };
                    let fut = refresh_fn(refresh_token);
                    let inner = Arc::clone(&self.inner);
                    let shared = async move {
                        let result = inner.run_refresh(fut).await;
                        inner
                            .inflight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();
                        result
                    }
                    .boxed()
                    .shared();
                    *inflight = Some(shared.clone());
                    shared
                }
            }
        };
        shared.await.map_err(Error::Refresh)
    }

    /// Register a state-change listener. Listeners are isolated from each
    /// other: one panicking does not prevent the rest from running.
    pub fn add_state_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&AuthStateChange) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        ListenerId(id)
    }

    /// Remove a previously registered listener.
    pub fn remove_state_listener(&self, id: ListenerId) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(listener_id, _)| *listener_id != id.0);
    }

    /// Tear the manager down: cancel timers, drop listeners, and reset the
    /// in-memory state to [`AuthState::Unauthenticated`] without touching
    /// storage. No notification is emitted.
    pub fn dispose(&self) {
        self.inner.cancel_timer();
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let mut session = self.inner.session_mut();
        session.tokens = None;
        session.state = AuthState::Unauthenticated;
    }
}

impl ManagerInner {
    fn session(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_mut(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn import_stored_session(self: &Arc<Self>) {
        let blob = match self.storage.get_item(&self.storage_key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read token storage, starting unauthenticated");
                return;
            }
        };
        match serde_json::from_str::<AuthTokens>(&blob) {
            Ok(tokens) if !tokens.is_refresh_expired() => {
                tracing::debug!("imported stored session");
                {
                    let mut session = self.session_mut();
                    session.tokens = Some(tokens.clone());
                    session.state = AuthState::Authenticated;
                }
                self.schedule_refresh(&tokens);
            }
            _ => {
                tracing::debug!("discarding unusable stored session");
                if let Err(err) = self.clear_tokens_from_storage().await {
                    tracing::warn!(error = %err, "failed to discard stored session");
                }
            }
        }
    }

    async fn apply_tokens(self: &Arc<Self>, tokens: AuthTokens) -> Result<()> {
        self.store_tokens_in_storage(&tokens).await?;
        let previous = {
            let mut session = self.session_mut();
            let previous = session.state;
            session.tokens = Some(tokens.clone());
            session.state = AuthState::Authenticated;
            previous
        };
        self.schedule_refresh(&tokens);
        tracing::debug!(?previous, "session authenticated");
        self.notify(AuthStateChange {
            previous,
            current: AuthState::Authenticated,
            tokens: Some(tokens),
            error: None,
        });
        Ok(())
    }

    async fn run_refresh<Fut>(
        self: &Arc<Self>,
        fut: Fut,
    ) -> std::result::Result<AuthTokens, Arc<Error>>
    where
        Fut: Future<Output = Result<AuthTokens>> + Send,
    {
        let (previous, held) = {
            let mut session = self.session_mut();
            let previous = session.state;
            session.state = AuthState::Refreshing;
            (previous, session.tokens.clone())
        };
        self.notify(AuthStateChange {
            previous,
            current: AuthState::Refreshing,
            tokens: held,
            error: None,
        });

        match fut.await {
            Ok(new_tokens) => {
                self.apply_tokens(new_tokens.clone())
                    .await
                    .map_err(Arc::new)?;
                Ok(new_tokens)
            }
            Err(err) => {
                let err = Arc::new(err);
                tracing::warn!(error = %err, "token refresh failed, session expired");
                self.cancel_timer();
                if let Err(storage_err) = self.clear_tokens_from_storage().await {
                    tracing::warn!(error = %storage_err, "failed to clear token storage");
                }
                let previous = {
                    let mut session = self.session_mut();
                    let previous = session.state;
                    session.tokens = None;
                    session.state = AuthState::Expired;
                    previous
                };
                self.notify(AuthStateChange {
                    previous,
                    current: AuthState::Expired,
                    tokens: None,
                    error: Some(Arc::clone(&err)),
                });
                Err(err)
            }
        }
    }

    async fn store_tokens_in_storage(&self, tokens: &AuthTokens) -> Result<()> {
        let blob = serde_json::to_string(tokens)?;
        self.storage.set_item(&self.storage_key, &blob).await
    }

    async fn clear_tokens_from_storage(&self) -> Result<()> {
        self.storage.remove_item(&self.storage_key).await
    }

    /// Schedule the auto-refresh timer for the given pair, always canceling
    /// any previous timer first so at most one is pending.
    fn schedule_refresh(self: &Arc<Self>, tokens: &AuthTokens) {
        self.cancel_timer();
        if !self.auto_refresh {
            return;
        }
        let Some(expires_at) = tokens.access_expires_at() else {
            return;
        };
        let threshold = chrono::Duration::from_std(self.refresh_threshold)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let delay = (expires_at - threshold - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        let weak = Arc::downgrade(self);
        let access = tokens.access().to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.mark_expired_if_current(&access);
            }
        });
        *self
            .refresh_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self
            .refresh_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    /// Timer callback: flip to `Expired` only if the pair the timer was
    /// scheduled for is still current and no refresh happened meanwhile.
    /// Tokens stay in memory so a caller-driven refresh is still possible.
    fn mark_expired_if_current(self: &Arc<Self>, access: &str) {
        let fired = {
            let mut session = self.session_mut();
            let still_current = session
                .tokens
                .as_ref()
                .is_some_and(|t| t.access() == access);
            if still_current && session.state == AuthState::Authenticated {
                session.state = AuthState::Expired;
                Some(session.tokens.clone())
            } else {
                None
            }
        };
        if let Some(tokens) = fired {
            tracing::debug!("refresh window reached without a refresh, session expired");
            self.notify(AuthStateChange {
                previous: AuthState::Authenticated,
                current: AuthState::Expired,
                tokens,
                error: None,
            });
        }
    }

    fn notify(&self, event: AuthStateChange) {
        let listeners: Vec<Arc<ListenerFn>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            // Each invocation is isolated: a panicking listener must not
            // prevent the rest from being notified.
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                tracing::warn!("auth state listener panicked, continuing");
            }
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .refresh_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
