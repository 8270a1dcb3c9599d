//! API key resolution.
//!
//! Every provider call resolves its key through [`Credentials::resolve`], so
//! all three operations agree on where the key comes from. Order:
//!
//! 1. a key chosen through a [`KeySelector`] or set explicitly
//! 2. `GEMINI_API_KEY`
//! 3. `API_KEY`
//! 4. `GOOGLE_API_KEY`

use crate::error::{ReimagineError, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Environment variables consulted for a key, in priority order.
pub const API_KEY_ENV_VARS: [&str; 3] = ["GEMINI_API_KEY", "API_KEY", "GOOGLE_API_KEY"];

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key, returning `None` for blank input.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        (!key.is_empty()).then_some(Self(key))
    }

    /// Returns the raw key for use in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Host capability that asks the user to pick (or re-pick) an API key.
#[async_trait]
pub trait KeySelector: Send + Sync {
    /// Prompts for a key. `Ok(None)` means the user cancelled.
    async fn select_key(&self) -> Result<Option<ApiKey>>;
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Shared key store, read at call time.
#[derive(Clone)]
pub struct Credentials {
    selected: Arc<RwLock<Option<ApiKey>>>,
    env: EnvLookup,
}

impl Credentials {
    /// Resolves from the process environment.
    pub fn from_env() -> Self {
        Self::with_env_lookup(|name| std::env::var(name).ok())
    }

    /// Starts with an explicit key; the environment is still the fallback.
    pub fn with_key(key: ApiKey) -> Self {
        Self {
            selected: Arc::new(RwLock::new(Some(key))),
            ..Self::from_env()
        }
    }

    /// Never reads the environment; only explicitly set keys resolve.
    pub fn isolated() -> Self {
        Self::with_env_lookup(|_| None)
    }

    /// Uses a custom variable lookup in place of the process environment.
    pub fn with_env_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            selected: Arc::new(RwLock::new(None)),
            env: Arc::new(lookup),
        }
    }

    /// Replaces the selected key.
    pub async fn set(&self, key: Option<ApiKey>) {
        *self.selected.write().await = key;
    }

    /// Returns the key to use for the next call, if any.
    pub async fn resolve(&self) -> Option<ApiKey> {
        if let Some(key) = self.selected.read().await.clone() {
            return Some(key);
        }
        API_KEY_ENV_VARS
            .iter()
            .find_map(|name| (self.env)(name).and_then(ApiKey::new))
    }

    /// Like [`resolve`](Self::resolve), but a missing key is an error.
    pub async fn require(&self) -> Result<ApiKey> {
        self.resolve()
            .await
            .ok_or(ReimagineError::MissingCredential)
    }

    /// Returns true if a key would resolve right now.
    pub async fn is_configured(&self) -> bool {
        self.resolve().await.is_some()
    }

    /// Runs the selection flow, storing the chosen key.
    ///
    /// Returns whether a key was chosen.
    pub async fn select_with(&self, selector: &dyn KeySelector) -> Result<bool> {
        match selector.select_key().await? {
            Some(key) => {
                tracing::debug!("API key selected");
                self.set(Some(key)).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}
