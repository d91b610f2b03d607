//! Bearer-token sources for the realtime connection.
//!
//! The token is read every time a connection is attempted, including automatic
//! retries, so a [`TokenStore`] cleared on logout stops the retry chain.

use std::sync::{Arc, PoisonError, RwLock};

/// Secret string types that redact values in debug output for security.
pub use secrecy::{ExposeSecret, SecretString};

/// Environment variable holding the persisted access token.
pub const ACCESS_TOKEN_VAR: &str = "MARKETPLACE_ACCESS_TOKEN";

/// Supplies the bearer token appended to the connection URL.
///
/// Returning `None` (or an empty token) aborts the connection attempt.
pub trait TokenSource: Send + Sync + 'static {
    fn access_token(&self) -> Option<SecretString>;
}

/// A fixed token, typically obtained at login.
#[derive(Clone, Debug)]
pub struct StaticToken(SecretString);

impl StaticToken {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self(SecretString::from(token))
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<SecretString> {
        non_empty(self.0.clone())
    }
}

/// Reads the token from an environment variable on every attempt.
#[derive(Clone, Debug)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    #[must_use]
    pub fn new(var: &str) -> Self {
        Self {
            var: var.to_owned(),
        }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        Self::new(ACCESS_TOKEN_VAR)
    }
}

impl TokenSource for EnvToken {
    fn access_token(&self) -> Option<SecretString> {
        std::env::var(&self.var)
            .ok()
            .map(SecretString::from)
            .and_then(non_empty)
    }
}

/// Shared, mutable token slot. Clones observe the same token.
#[derive(Clone, Debug, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<SecretString>>>,
}

impl TokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: String) -> Self {
        let store = Self::new();
        store.set(token);
        store
    }

    // The slot holds no intermediate state, so a poisoned lock is safe to reuse.
    pub fn set(&self, token: String) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) =
            Some(SecretString::from(token));
    }

    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl TokenSource for TokenStore {
    fn access_token(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .and_then(non_empty)
    }
}

fn non_empty(token: SecretString) -> Option<SecretString> {
    if token.expose_secret().trim().is_empty() {
        None
    } else {
        Some(token)
    }
}
