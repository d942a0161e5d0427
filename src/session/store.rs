use std::sync::{PoisonError, RwLock};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Access token plus the refresh token that can renew it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub issued_at: Timestamp,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            issued_at: Timestamp::now(),
        }
    }
}

/// Opaque key-value storage for the session's tokens.
///
/// Implementations must be cheap and non-blocking; they are called from async
/// code without being awaited.
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn set_access_token(&self, token: String);
    fn set_refresh_token(&self, token: String);
    fn clear(&self);

    fn install(&self, pair: CredentialPair) {
        self.set_access_token(pair.access_token);
        if let Some(refresh) = pair.refresh_token {
            self.set_refresh_token(refresh);
        }
    }
}

#[derive(Debug, Default)]
struct StoredTokens {
    access: Option<String>,
    refresh: Option<String>,
    updated_at: Option<Timestamp>,
}

/// Process-local store, suitable for tests and short-lived embedders.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<StoredTokens>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        let store = Self::default();
        store.install(pair);
        store
    }

    /// Current pair, if an access token is stored.
    pub fn snapshot(&self) -> Option<CredentialPair> {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        let access_token = tokens.access.clone()?;
        Some(CredentialPair {
            access_token,
            refresh_token: tokens.refresh.clone(),
            issued_at: tokens.updated_at.unwrap_or_else(Timestamp::now),
        })
    }

    fn update(&self, apply: impl FnOnce(&mut StoredTokens)) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut tokens);
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access
            .clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh
            .clone()
    }

    fn set_access_token(&self, token: String) {
        self.update(|t| {
            t.access = Some(token);
            t.updated_at = Some(Timestamp::now());
        });
    }

    fn set_refresh_token(&self, token: String) {
        self.update(|t| {
            t.refresh = Some(token);
            t.updated_at = Some(Timestamp::now());
        });
    }

    fn clear(&self) {
        self.update(|t| *t = StoredTokens::default());
    }
}
