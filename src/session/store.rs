//! Token Store - single owner of credential state
//!
//! Every credential mutation in the crate goes through this type: login
//! stores, refresh rotates, logout and unrecoverable refresh failures
//! clear. Anything else that wants a token reads it from here, and any
//! other request-issuing code goes through the authenticated pipeline
//! rather than touching storage keys directly.

use crate::models::auth::{Credential, LoginResponse, TokenPair, UserSummary};
use crate::storage::{keys, StateStore};
use anyhow::{Context, Result};
use std::sync::{Arc, RwLock};

pub struct TokenStore {
    storage: Arc<dyn StateStore>,
    // The CSRF token mirrors a host cookie; it is per-page-load state and
    // is not persisted through the state store
    csrf_token: RwLock<Option<String>>,
}

impl TokenStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StateStore>) -> Self {
        Self {
            storage,
            csrf_token: RwLock::new(None),
        }
    }

    /// Current access token, if the session holds one
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.storage.get(keys::ACCESS_TOKEN)
    }

    /// Current refresh token, if the session holds one
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(keys::REFRESH_TOKEN)
    }

    #[must_use]
    pub fn csrf_token(&self) -> Option<String> {
        self.csrf_token
            .read()
            .expect("csrf lock poisoned")
            .clone()
    }

    pub fn set_csrf_token(&self, token: Option<String>) {
        *self.csrf_token.write().expect("csrf lock poisoned") = token;
    }

    /// Whether the session currently holds credentials at all
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Snapshot of the full credential, when present
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        let access_token = self.access_token()?;
        let refresh_token = self.refresh_token()?;
        Some(Credential {
            access_token,
            refresh_token,
            csrf_token: self.csrf_token(),
        })
    }

    /// Persist the credential and user summary of a fresh login
    ///
    /// # Errors
    ///
    /// Returns an error if the user summary cannot be serialized.
    pub fn store_login(&self, login: &LoginResponse) -> Result<()> {
        self.storage.set(keys::ACCESS_TOKEN, &login.tokens.access);
        if let Some(refresh) = &login.tokens.refresh {
            self.storage.set(keys::REFRESH_TOKEN, refresh);
        }
        self.store_user(&login.user)?;
        log::debug!("Stored credentials for {}", login.user.email);
        Ok(())
    }

    /// Persist a refresh outcome: always the new access token, and the
    /// rotated refresh token whenever the server issued one
    pub fn apply_refresh(&self, pair: &TokenPair) {
        self.storage.set(keys::ACCESS_TOKEN, &pair.access);
        if let Some(rotated) = &pair.refresh {
            self.storage.set(keys::REFRESH_TOKEN, rotated);
            log::debug!("Refresh token rotated by server");
        }
    }

    /// Persisted summary of the signed-in user
    ///
    /// # Errors
    ///
    /// Returns an error if the stored summary is not valid JSON.
    pub fn user(&self) -> Result<Option<UserSummary>> {
        self.storage
            .get(keys::USER)
            .map(|raw| serde_json::from_str(&raw).context("stored user summary is malformed"))
            .transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the summary cannot be serialized.
    pub fn store_user(&self, user: &UserSummary) -> Result<()> {
        let raw = serde_json::to_string(user).context("user summary serialization failed")?;
        self.storage.set(keys::USER, &raw);
        Ok(())
    }

    /// Destroy all credential state (logout, refresh failure)
    ///
    /// Attempt markers (lockout, submitted) are deliberately left in
    /// place: lockout is monotonic per browser session.
    pub fn clear(&self) {
        self.storage.remove(keys::ACCESS_TOKEN);
        self.storage.remove(keys::REFRESH_TOKEN);
        self.storage.remove(keys::USER);
        self.set_csrf_token(None);
        log::debug!("Credential state cleared");
    }
}
