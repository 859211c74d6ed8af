//! Authentication state and state-change events

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::tokens::AuthTokens;
use crate::error::Error;

/// Current authentication state held by the token manager.
///
/// Exactly one value is current at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    /// No session is held.
    Unauthenticated,
    /// A token pair is held.
    Authenticated,
    /// A refresh is in flight.
    Refreshing,
    /// The session lapsed: a refresh failed, or the scheduled refresh timer
    /// fired without a refresh having happened.
    Expired,
}

/// Event delivered to listeners on every state transition.
#[derive(Debug, Clone)]
pub struct AuthStateChange {
    /// State before the transition
    pub previous: AuthState,
    /// State after the transition
    pub current: AuthState,
    /// Tokens held after the transition, if any
    pub tokens: Option<AuthTokens>,
    /// The error that caused the transition, for failure transitions
    pub error: Option<Arc<Error>>,
}
