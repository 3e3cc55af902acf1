use std::str::FromStr;
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::models::{
    AuthSettings, AuthType, Identity, Scope, ServerConfig, TransportKind, TransportParams,
};
use crate::repositories::row_query::{RowQuery, StoreError};

pub const SERVER_TABLE: &str = "mcp_server_configs";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServerConfigRepository: Send + Sync {
    /// Enabled server configurations for one scope of the given identity.
    async fn list_enabled(
        &self,
        scope: Scope,
        identity: &Identity,
    ) -> Result<Vec<ServerConfig>, StoreError>;
}

/// [`ServerConfigRepository`] backed by the opaque row-query interface.
pub struct RowQueryConfigRepository {
    rows: Arc<dyn RowQuery>,
}

impl RowQueryConfigRepository {
    pub fn new(rows: Arc<dyn RowQuery>) -> Self {
        Self { rows }
    }

    fn scope_filters(scope: Scope, identity: &Identity) -> Vec<(String, String)> {
        let mut filters = vec![
            ("scope".to_string(), format!("eq.{}", scope)),
            ("enabled".to_string(), "eq.true".to_string()),
        ];
        match scope {
            Scope::Platform => {}
            Scope::Organization => {
                if let Some(org) = &identity.organization_id {
                    filters.push(("organization_id".to_string(), format!("eq.{}", org)));
                }
            }
            Scope::User => {
                filters.push(("user_id".to_string(), format!("eq.{}", identity.user_id)));
            }
            Scope::Project => {
                if let Some(project) = &identity.project_id {
                    filters.push(("project_id".to_string(), format!("eq.{}", project)));
                }
            }
        }
        filters
    }
}

#[async_trait]
impl ServerConfigRepository for RowQueryConfigRepository {
    async fn list_enabled(
        &self,
        scope: Scope,
        identity: &Identity,
    ) -> Result<Vec<ServerConfig>, StoreError> {
        let filters = Self::scope_filters(scope, identity);
        let rows = self.rows.select(SERVER_TABLE, &filters, "*").await?;

        // Bad rows are dropped individually; one legacy row must not take
        // the whole scope down with it.
        let configs = rows
            .into_iter()
            .filter_map(|row| match decode_row(row, scope) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(scope = %scope, error = %e, "skipping undecodable server row");
                    None
                }
            })
            .collect();

        Ok(configs)
    }
}

#[derive(Debug, Deserialize)]
struct ServerConfigRow {
    id: Value,
    name: String,
    namespace: String,
    #[serde(default)]
    scope: Option<String>,
    transport_kind: String,
    #[serde(default)]
    transport_params: Value,
    #[serde(default)]
    auth_type: Option<String>,
    #[serde(default)]
    auth_config: Value,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn decode_row(row: Value, query_scope: Scope) -> anyhow::Result<ServerConfig> {
    let row: ServerConfigRow = serde_json::from_value(row)?;

    // Trust the row's own scope when present, otherwise the scope the query
    // was issued for.
    let scope = match row.scope.as_deref() {
        Some(raw) => Scope::from_str(raw).map_err(anyhow::Error::msg)?,
        None => query_scope,
    };

    let auth_type = match row.auth_type.as_deref() {
        Some(raw) => AuthType::from_str(raw).map_err(anyhow::Error::msg)?,
        None => AuthType::None,
    };

    let id = match &row.id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Ok(ServerConfig {
        id,
        name: row.name,
        namespace: row.namespace,
        scope,
        transport_kind: TransportKind::from(row.transport_kind),
        transport_params: decode_transport_params(row.transport_params)?,
        auth_type,
        auth_settings: decode_auth_settings(row.auth_config)?,
        enabled: row.enabled,
    })
}

/// Historical rows stored transport parameters three ways: a JSON object, a
/// JSON-encoded string of that object, or a bare URL string.
fn decode_transport_params(value: Value) -> anyhow::Result<TransportParams> {
    match value {
        Value::Null => Ok(TransportParams::default()),
        Value::String(s) => {
            if let Ok(inner @ Value::Object(_)) = serde_json::from_str::<Value>(&s) {
                return Ok(serde_json::from_value(inner)?);
            }
            Ok(TransportParams {
                url: Some(s),
                ..Default::default()
            })
        }
        object @ Value::Object(_) => Ok(serde_json::from_value(object)?),
        other => bail!("transport_params has unexpected shape: {}", other),
    }
}

fn decode_auth_settings(value: Value) -> anyhow::Result<AuthSettings> {
    match value {
        Value::Null => Ok(AuthSettings::default()),
        Value::String(s) => {
            // Bare string means the secret itself.
            if s.trim_start().starts_with('{') {
                if let Ok(settings) = serde_json::from_str::<AuthSettings>(&s) {
                    return Ok(settings);
                }
            }
            Ok(AuthSettings {
                secret: Some(s),
                ..Default::default()
            })
        }
        object @ Value::Object(_) => Ok(serde_json::from_value(object)?),
        other => bail!("auth_config has unexpected shape: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_a_plain_row() {
        let row = json!({
            "id": 42,
            "name": "search",
            "namespace": "search/server",
            "scope": "platform",
            "transport_kind": "http",
            "transport_params": {"url": "https://search.example/mcp"},
            "auth_type": "none",
            "auth_config": null,
            "enabled": true
        });

        let config = decode_row(row, Scope::Platform).unwrap();
        assert_eq!(config.id, "42");
        assert_eq!(config.scope, Scope::Platform);
        assert_eq!(config.transport_kind, TransportKind::Http);
        assert_eq!(
            config.transport_params.url.as_deref(),
            Some("https://search.example/mcp")
        );
        assert_eq!(config.auth_type, AuthType::None);
    }

    #[test]
    fn decodes_legacy_string_transport_params() {
        let row = json!({
            "id": "srv-1",
            "name": "crm",
            "namespace": "crm/server",
            "scope": "organization",
            "transport_kind": "sse",
            "transport_params": "{\"url\":\"https://crm.example/mcp\",\"env\":{}}",
            "auth_type": "bearer",
            "auth_config": "s3cret"
        });

        let config = decode_row(row, Scope::Organization).unwrap();
        assert_eq!(
            config.transport_params.url.as_deref(),
            Some("https://crm.example/mcp")
        );
        assert_eq!(config.auth_settings.secret.as_deref(), Some("s3cret"));
        assert!(config.enabled, "enabled defaults to true");
    }

    #[test]
    fn bare_url_string_becomes_the_url_param() {
        let params = decode_transport_params(json!("https://x.example/mcp")).unwrap();
        assert_eq!(params.url.as_deref(), Some("https://x.example/mcp"));
    }

    #[test]
    fn unknown_transport_kind_survives_decoding() {
        let row = json!({
            "id": "srv-2",
            "name": "odd",
            "namespace": "odd/server",
            "scope": "user",
            "transport_kind": "grpc",
            "auth_type": "none"
        });

        let config = decode_row(row, Scope::User).unwrap();
        assert_eq!(
            config.transport_kind,
            TransportKind::Unrecognized("grpc".to_string())
        );
    }

    #[test]
    fn unknown_scope_is_rejected_per_row() {
        let row = json!({
            "id": "srv-3",
            "name": "odd",
            "namespace": "odd/server",
            "scope": "galaxy",
            "transport_kind": "http",
            "auth_type": "none"
        });

        let error = decode_row(row, Scope::User).unwrap_err();
        assert!(error.to_string().contains("unknown scope"));
    }

    #[test]
    fn scope_filters_carry_identity_bindings() {
        let identity = Identity::user("u1").with_organization("o1");

        let platform = RowQueryConfigRepository::scope_filters(Scope::Platform, &identity);
        assert!(platform.contains(&("scope".to_string(), "eq.platform".to_string())));
        assert!(!platform.iter().any(|(k, _)| k == "user_id"));

        let user = RowQueryConfigRepository::scope_filters(Scope::User, &identity);
        assert!(user.contains(&("user_id".to_string(), "eq.u1".to_string())));

        let org = RowQueryConfigRepository::scope_filters(Scope::Organization, &identity);
        assert!(org.contains(&("organization_id".to_string(), "eq.o1".to_string())));
    }
}
