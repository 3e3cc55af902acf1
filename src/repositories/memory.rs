//! In-memory repository implementations.
//!
//! Used by tests and by embedders that assemble configuration themselves
//! instead of pointing the engine at a store.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::models::{Identity, OAuthToken, Scope, ServerConfig};
use crate::repositories::config_repository::ServerConfigRepository;
use crate::repositories::row_query::StoreError;
use crate::repositories::token_repository::TokenRepository;

#[derive(Clone, Default)]
pub struct InMemoryConfigRepository {
    servers: Arc<RwLock<Vec<ServerConfig>>>,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, config: ServerConfig) {
        if let Ok(mut servers) = self.servers.write() {
            servers.push(config);
        }
    }

    pub fn with_servers(configs: impl IntoIterator<Item = ServerConfig>) -> Self {
        let repo = Self::new();
        for config in configs {
            repo.push(config);
        }
        repo
    }
}

#[async_trait]
impl ServerConfigRepository for InMemoryConfigRepository {
    async fn list_enabled(
        &self,
        scope: Scope,
        _identity: &Identity,
    ) -> Result<Vec<ServerConfig>, StoreError> {
        let servers = self
            .servers
            .read()
            .map_err(|_| StoreError::Config("server list lock poisoned".to_string()))?;

        Ok(servers
            .iter()
            .filter(|s| s.scope == scope && s.enabled)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTokenRepository {
    tokens: Arc<RwLock<Vec<OAuthToken>>>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, token: OAuthToken) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.push(token);
        }
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn latest_token(
        &self,
        namespace: &str,
        identity: &Identity,
    ) -> Result<Option<OAuthToken>, StoreError> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| StoreError::Config("token list lock poisoned".to_string()))?;

        Ok(tokens
            .iter()
            .filter(|t| t.namespace == namespace && t.matches_identity(identity))
            .max_by_key(|t| t.issued_at)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn token(namespace: &str, issued_offset: i64) -> OAuthToken {
        let now = Utc::now();
        OAuthToken {
            namespace: namespace.to_string(),
            access_token: format!("at-{}", issued_offset),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            scope: None,
            issued_at: now + Duration::seconds(issued_offset),
            expires_at: now + Duration::seconds(issued_offset + 3600),
            user_id: Some("u1".to_string()),
            organization_id: None,
        }
    }

    #[tokio::test]
    async fn latest_token_picks_newest_issued() {
        let repo = InMemoryTokenRepository::new();
        repo.push(token("drive/server", 0));
        repo.push(token("drive/server", 10));
        repo.push(token("other/server", 20));

        let latest = repo
            .latest_token("drive/server", &Identity::user("u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.access_token, "at-10");
    }

    #[tokio::test]
    async fn latest_token_respects_identity() {
        let repo = InMemoryTokenRepository::new();
        repo.push(token("drive/server", 0));

        let miss = repo
            .latest_token("drive/server", &Identity::user("someone-else"))
            .await
            .unwrap();
        assert!(miss.is_none());
    }
}
