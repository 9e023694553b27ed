//! Explicit session context for user-scoped operations.
//!
//! Sign-in itself belongs to an external identity provider; this module only
//! carries the resulting user id to the code that builds record paths.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Opaque id of the signed-in user, used as a path segment.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate an id handed over by the identity provider.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("user id must not be empty".into()));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
        {
            return Err(Error::InvalidInput(format!(
                "user id contains forbidden character {bad:?}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Ids end up in logs; keep only a prefix.
impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "UserId({prefix}…)")
    }
}

impl TryFrom<String> for UserId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// Shared, swappable view of who is signed in.
///
/// Clones observe sign-in and sign-out performed through any other clone.
#[derive(Clone, Default)]
pub struct SessionHandle {
    user: Arc<RwLock<Option<UserId>>>,
}

impl SessionHandle {
    /// A session with nobody signed in.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// A session already signed in as `user`.
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: Arc::new(RwLock::new(Some(user))),
        }
    }

    pub fn sign_in(&self, user: UserId) {
        tracing::info!("Signed in as {user:?}");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    pub fn sign_out(&self) {
        tracing::info!("Signed out");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The current user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current user, or `Unauthenticated`.
    pub fn require_user(&self) -> Result<UserId> {
        self.current_user().ok_or(Error::Unauthenticated)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("user", &self.current_user())
            .finish()
    }
}

/// Identity-provider hook that re-verifies the user before destructive actions.
#[allow(async_fn_in_trait)]
pub trait Reauthenticator {
    async fn reauthenticate(&self, user: &UserId) -> Result<()>;
}
