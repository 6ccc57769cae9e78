//! Account resolution

use crate::config::AuthConfig;
use crate::error::{Result, ServiceError};
use persistence::AccountId;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Resolves a caller's token to the account that scopes its store calls
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<AccountId>;
}

/// Token map loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticAuthProvider {
    tokens: HashMap<String, AccountId>,
}

impl StaticAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration, rejecting account ids the store cannot hold
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let mut provider = Self::new();
        for (token, account) in &config.tokens {
            provider.insert(token, AccountId::new(account.as_str())?);
        }
        if provider.tokens.is_empty() {
            warn!("No auth tokens configured; every request will be rejected");
        }
        Ok(provider)
    }

    pub fn insert(&mut self, token: impl Into<String>, account: AccountId) {
        self.tokens.insert(token.into(), account);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait::async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn resolve(&self, token: &str) -> Result<AccountId> {
        match self.tokens.get(token.trim()) {
            Some(account) => {
                debug!(%account, "Token resolved");
                Ok(account.clone())
            }
            None => {
                warn!("Rejected unknown token");
                Err(ServiceError::Unauthenticated)
            }
        }
    }
}
