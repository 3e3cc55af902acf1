use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::models::{Identity, OAuthToken};
use crate::repositories::row_query::{RowQuery, StoreError};

pub const TOKEN_TABLE: &str = "mcp_oauth_tokens";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait TokenRepository: Send + Sync {
    /// Most recent token for a (namespace, identity) pair, expired or not.
    /// Usability is the caller's call; refresh is not ours to trigger.
    async fn latest_token(
        &self,
        namespace: &str,
        identity: &Identity,
    ) -> Result<Option<OAuthToken>, StoreError>;
}

/// [`TokenRepository`] backed by the opaque row-query interface.
pub struct RowQueryTokenRepository {
    rows: Arc<dyn RowQuery>,
}

impl RowQueryTokenRepository {
    pub fn new(rows: Arc<dyn RowQuery>) -> Self {
        Self { rows }
    }

    async fn latest_by(
        &self,
        namespace: &str,
        identity_column: &str,
        identity_value: &str,
    ) -> Result<Option<OAuthToken>, StoreError> {
        let filters = vec![
            ("namespace".to_string(), format!("eq.{}", namespace)),
            (
                identity_column.to_string(),
                format!("eq.{}", identity_value),
            ),
            ("order".to_string(), "issued_at.desc".to_string()),
            ("limit".to_string(), "1".to_string()),
        ];

        let rows = self.rows.select(TOKEN_TABLE, &filters, "*").await?;
        match rows.into_iter().next() {
            Some(row) => {
                let token = decode_token(row).map_err(StoreError::Query)?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TokenRepository for RowQueryTokenRepository {
    async fn latest_token(
        &self,
        namespace: &str,
        identity: &Identity,
    ) -> Result<Option<OAuthToken>, StoreError> {
        // User-bound tokens win; organization-bound ones are the fallback
        // for servers authorized once for a whole organization.
        if let Some(token) = self
            .latest_by(namespace, "user_id", &identity.user_id)
            .await?
        {
            return Ok(Some(token));
        }
        if let Some(org) = &identity.organization_id {
            return self.latest_by(namespace, "organization_id", org).await;
        }
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct TokenRow {
    namespace: String,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    organization_id: Option<String>,
}

fn decode_token(row: Value) -> anyhow::Result<OAuthToken> {
    let row: TokenRow = serde_json::from_value(row)?;
    if row.user_id.is_none() && row.organization_id.is_none() {
        bail!("token bound to neither user nor organization");
    }
    Ok(OAuthToken {
        namespace: row.namespace,
        access_token: row.access_token,
        refresh_token: row.refresh_token,
        token_type: row.token_type.unwrap_or_else(|| "Bearer".to_string()),
        scope: row.scope,
        issued_at: row.issued_at,
        expires_at: row.expires_at,
        user_id: row.user_id,
        organization_id: row.organization_id,
    })
}
