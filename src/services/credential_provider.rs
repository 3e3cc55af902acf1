//! Credential resolution for configured servers.
//!
//! A pure lookup: static secrets come straight from the configuration,
//! OAuth material from the token store. Nothing here ever starts an
//! authorization flow; a missing or expired token is reported as such and
//! surfaced to the caller through the entry's auth status.

use std::sync::Arc;

use chrono::Utc;

use crate::models::{AuthType, Identity, ServerConfig};
use crate::repositories::token_repository::TokenRepository;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("No usable credential for namespace '{0}'")]
    Missing(String),
}

/// Resolved authentication material for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    ApiKey {
        header_name: Option<String>,
        key: String,
    },
}

impl Credential {
    /// Header pair to attach to http/sse transports. Bearer credentials use
    /// the standard `Authorization` form; API keys honour a declared
    /// provider-specific header and fall back to the bearer form.
    pub fn header(&self) -> (String, String) {
        match self {
            Credential::Bearer(token) => {
                ("Authorization".to_string(), format!("Bearer {}", token))
            }
            Credential::ApiKey { header_name, key } => match header_name {
                Some(name) => (name.clone(), key.clone()),
                None => ("Authorization".to_string(), format!("Bearer {}", key)),
            },
        }
    }

    /// Raw secret, for env-var injection into stdio transports.
    pub fn secret(&self) -> &str {
        match self {
            Credential::Bearer(token) => token,
            Credential::ApiKey { key, .. } => key,
        }
    }
}

#[derive(Clone)]
pub struct CredentialProvider {
    tokens: Option<Arc<dyn TokenRepository>>,
}

impl CredentialProvider {
    pub fn new(tokens: Option<Arc<dyn TokenRepository>>) -> Self {
        Self { tokens }
    }

    pub async fn resolve(
        &self,
        config: &ServerConfig,
        identity: &Identity,
    ) -> Result<Option<Credential>, CredentialError> {
        match config.auth_type {
            AuthType::None => Ok(None),
            AuthType::Bearer => config
                .auth_settings
                .secret
                .clone()
                .map(|secret| Some(Credential::Bearer(secret)))
                .ok_or_else(|| CredentialError::Missing(config.namespace.clone())),
            AuthType::ApiKey => config
                .auth_settings
                .secret
                .clone()
                .map(|key| {
                    Some(Credential::ApiKey {
                        header_name: config.auth_settings.header_name.clone(),
                        key,
                    })
                })
                .ok_or_else(|| CredentialError::Missing(config.namespace.clone())),
            AuthType::OAuth => self.resolve_oauth(config, identity).await,
        }
    }

    async fn resolve_oauth(
        &self,
        config: &ServerConfig,
        identity: &Identity,
    ) -> Result<Option<Credential>, CredentialError> {
        let Some(repo) = &self.tokens else {
            return Err(CredentialError::Missing(config.namespace.clone()));
        };

        match repo.latest_token(&config.namespace, identity).await {
            Ok(Some(token)) if token.is_usable(Utc::now()) => {
                Ok(Some(Credential::Bearer(token.access_token)))
            }
            Ok(Some(_)) => {
                tracing::debug!(
                    namespace = %config.namespace,
                    "latest token expired, authorization needed"
                );
                Err(CredentialError::Missing(config.namespace.clone()))
            }
            Ok(None) => Err(CredentialError::Missing(config.namespace.clone())),
            Err(e) => {
                // Store trouble on the token path is indistinguishable from
                // "not authorized yet" as far as the entry is concerned.
                tracing::warn!(namespace = %config.namespace, error = %e, "token lookup failed");
                Err(CredentialError::Missing(config.namespace.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthSettings, OAuthToken, Scope, TransportKind, TransportParams};
    use crate::repositories::memory::InMemoryTokenRepository;
    use chrono::Duration;

    fn server(auth_type: AuthType, settings: AuthSettings) -> ServerConfig {
        ServerConfig {
            id: "srv-1".to_string(),
            name: "drive".to_string(),
            namespace: "drive/server".to_string(),
            scope: Scope::User,
            transport_kind: TransportKind::Http,
            transport_params: TransportParams {
                url: Some("https://drive.example/mcp".to_string()),
                ..Default::default()
            },
            auth_type,
            auth_settings: settings,
            enabled: true,
        }
    }

    fn token(expires_in: i64, access_token: &str) -> OAuthToken {
        let now = Utc::now();
        OAuthToken {
            namespace: "drive/server".to_string(),
            access_token: access_token.to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            scope: None,
            issued_at: now,
            expires_at: now + Duration::seconds(expires_in),
            user_id: Some("u1".to_string()),
            organization_id: None,
        }
    }

    #[tokio::test]
    async fn auth_none_needs_no_credential() {
        let provider = CredentialProvider::new(None);
        let resolved = provider
            .resolve(&server(AuthType::None, AuthSettings::default()), &Identity::user("u1"))
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn bearer_uses_the_stored_secret() {
        let provider = CredentialProvider::new(None);
        let settings = AuthSettings {
            secret: Some("s3cret".to_string()),
            ..Default::default()
        };
        let resolved = provider
            .resolve(&server(AuthType::Bearer, settings), &Identity::user("u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            resolved.header(),
            ("Authorization".to_string(), "Bearer s3cret".to_string())
        );
    }

    #[tokio::test]
    async fn bearer_without_secret_is_missing() {
        let provider = CredentialProvider::new(None);
        let result = provider
            .resolve(&server(AuthType::Bearer, AuthSettings::default()), &Identity::user("u1"))
            .await;
        assert!(matches!(result, Err(CredentialError::Missing(_))));
    }

    #[tokio::test]
    async fn api_key_honours_declared_header() {
        let provider = CredentialProvider::new(None);
        let settings = AuthSettings {
            secret: Some("k-123".to_string()),
            header_name: Some("X-Api-Key".to_string()),
            ..Default::default()
        };
        let resolved = provider
            .resolve(&server(AuthType::ApiKey, settings), &Identity::user("u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            resolved.header(),
            ("X-Api-Key".to_string(), "k-123".to_string())
        );
    }

    #[tokio::test]
    async fn oauth_resolves_latest_usable_token() {
        let tokens = InMemoryTokenRepository::new();
        tokens.push(token(3600, "at-live"));
        let provider = CredentialProvider::new(Some(Arc::new(tokens)));

        let resolved = provider
            .resolve(&server(AuthType::OAuth, AuthSettings::default()), &Identity::user("u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.secret(), "at-live");
    }

    #[tokio::test]
    async fn expired_oauth_token_is_missing() {
        let tokens = InMemoryTokenRepository::new();
        tokens.push(token(-60, "at-stale"));
        let provider = CredentialProvider::new(Some(Arc::new(tokens)));

        let result = provider
            .resolve(&server(AuthType::OAuth, AuthSettings::default()), &Identity::user("u1"))
            .await;
        assert!(matches!(result, Err(CredentialError::Missing(_))));
    }

    #[tokio::test]
    async fn oauth_without_token_store_is_missing() {
        let provider = CredentialProvider::new(None);
        let result = provider
            .resolve(&server(AuthType::OAuth, AuthSettings::default()), &Identity::user("u1"))
            .await;
        assert!(matches!(result, Err(CredentialError::Missing(_))));
    }
}
