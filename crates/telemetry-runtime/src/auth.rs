//! Authentication state with change notifications.
//!
//! [`AuthStore`] keeps the current [`AuthState`] in an [`ObservableState`]
//! and persists the signed-in session through a [`TokenStore`]. Subscribers
//! are called synchronously on every state replacement.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use telemetry_core::error::Result;
use telemetry_core::observable::{ObservableState, Subscription};

use crate::shared::SharedAggregator;

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Stored credentials have not been checked yet.
    Unknown,
    Anonymous,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub status: AuthStatus,
    pub user: Option<UserProfile>,
}

impl AuthState {
    fn unknown() -> Self {
        Self {
            status: AuthStatus::Unknown,
            user: None,
        }
    }

    fn anonymous() -> Self {
        Self {
            status: AuthStatus::Anonymous,
            user: None,
        }
    }

    fn authenticated(user: UserProfile) -> Self {
        Self {
            status: AuthStatus::Authenticated,
            user: Some(user),
        }
    }
}

// ── Token storage ─────────────────────────────────────────────────────────────

/// A persisted sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: UserProfile,
}

/// Where the signed-in session survives between launches.
pub trait TokenStore {
    fn load(&self) -> Option<StoredSession>;
    fn save(&mut self, session: &StoredSession) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    session: Option<StoredSession>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: StoredSession) -> Self {
        Self {
            session: Some(session),
        }
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self) -> Option<StoredSession> {
        self.session.clone()
    }

    fn save(&mut self, session: &StoredSession) -> Result<()> {
        self.session = Some(session.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.session = None;
        Ok(())
    }
}

// ── AuthStore ─────────────────────────────────────────────────────────────────

pub struct AuthStore {
    state: ObservableState<AuthState>,
    tokens: RefCell<Box<dyn TokenStore>>,
}

impl AuthStore {
    pub fn new(tokens: Box<dyn TokenStore>) -> Self {
        Self {
            state: ObservableState::new(AuthState::unknown()),
            tokens: RefCell::new(tokens),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemoryTokenStore::new()))
    }

    /// Resolve the `Unknown` status from stored credentials.
    pub fn restore(&self) -> AuthState {
        let next = match self.tokens.borrow().load() {
            Some(session) => AuthState::authenticated(session.user),
            None => AuthState::anonymous(),
        };
        self.state.set(next.clone());
        next
    }

    /// Persist the session, then publish the authenticated state.
    pub fn sign_in(&self, user: UserProfile, token: impl Into<String>) -> Result<()> {
        let session = StoredSession {
            token: token.into(),
            user: user.clone(),
        };
        self.tokens.borrow_mut().save(&session)?;
        tracing::info!(user_id = %user.id, "user signed in");
        self.state.set(AuthState::authenticated(user));
        Ok(())
    }

    pub fn sign_out(&self) -> Result<()> {
        self.tokens.borrow_mut().clear()?;
        tracing::info!("user signed out");
        self.state.set(AuthState::anonymous());
        Ok(())
    }

    pub fn state(&self) -> AuthState {
        self.state.get()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.get().status == AuthStatus::Authenticated
    }

    pub fn token(&self) -> Option<String> {
        self.tokens.borrow().load().map(|s| s.token)
    }

    pub fn subscribe(&self, callback: impl Fn(&AuthState) + 'static) -> Subscription<AuthState> {
        self.state.subscribe(callback)
    }
}

/// Attach the signed-in user's id to `aggregator` whenever the auth state
/// becomes authenticated with a different user.
pub fn bind_identity(store: &AuthStore, aggregator: SharedAggregator) -> Subscription<AuthState> {
    store.subscribe(move |state| {
        let Some(user) = state.user.as_ref() else {
            return;
        };
        if state.status != AuthStatus::Authenticated {
            return;
        }
        aggregator.with(|agg| {
            if agg.user_id() != Some(user.id.as_str()) {
                agg.set_user_id(&user.id);
            }
        });
    })
}
