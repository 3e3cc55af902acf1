//! The opaque row-query interface the storage layer is consumed through.
//!
//! `select(table, filters, columns)` is the whole contract; filters are
//! passed straight through as query parameters, which is exactly the
//! PostgREST wire shape (`scope=eq.platform`, `order=issued_at.desc`, ...).

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Store returned HTTP {0}")]
    Status(u16),

    #[error("Row decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Store query error: {0}")]
    Query(#[from] anyhow::Error),

    #[error("Store misconfigured: {0}")]
    Config(String),
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait RowQuery: Send + Sync {
    /// Fetch rows from `table`, filtered by the given query parameters,
    /// projecting `columns`. Treated as network I/O that can fail or come
    /// back empty.
    async fn select(
        &self,
        table: &str,
        filters: &[(String, String)],
        columns: &str,
    ) -> Result<Vec<Value>, StoreError>;
}

/// PostgREST-style HTTP adapter for [`RowQuery`].
///
/// Speaks the `/rest/v1/{table}` convention with `apikey` + bearer headers,
/// which is what the hosted configuration store exposes.
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    base_url: reqwest::Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl PostgrestClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, StoreError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| StoreError::Config(format!("invalid store URL '{}': {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    /// Reads `WEAVEMCP_STORE_URL` / `WEAVEMCP_STORE_KEY`. Returns `None`
    /// when no store is configured, which composition treats as "no extra
    /// tools" rather than an error.
    pub fn from_env() -> Option<Self> {
        dotenvy::dotenv().ok();
        let url = std::env::var("WEAVEMCP_STORE_URL").ok()?;
        let key = std::env::var("WEAVEMCP_STORE_KEY").ok();
        match Self::new(&url, key) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring misconfigured store environment");
                None
            }
        }
    }

    fn table_url(&self, table: &str) -> Result<reqwest::Url, StoreError> {
        self.base_url
            .join(&format!("rest/v1/{}", table))
            .map_err(|e| StoreError::Config(format!("invalid table name '{}': {}", table, e)))
    }
}

#[async_trait]
impl RowQuery for PostgrestClient {
    async fn select(
        &self,
        table: &str,
        filters: &[(String, String)],
        columns: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let url = self.table_url(table)?;

        let mut request = self.client.get(url).query(&[("select", columns)]);
        for (key, value) in filters {
            request = request.query(&[(key.as_str(), value.as_str())]);
        }
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        Ok(response.json::<Vec<Value>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparsable_base_url() {
        assert!(matches!(
            PostgrestClient::new("not a url", None),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn builds_table_urls_under_rest_v1() {
        let client = PostgrestClient::new("https://store.example/", None).unwrap();
        let url = client.table_url("mcp_server_configs").unwrap();
        assert_eq!(
            url.as_str(),
            "https://store.example/rest/v1/mcp_server_configs"
        );
    }
}
