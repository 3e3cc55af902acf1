//! Per-server transport validation and descriptor construction.
//!
//! Build happens before any network or process attempt: a descriptor is the
//! validated, credential-carrying recipe a [`TransportHandle`] connects
//! from lazily.
//!
//! [`TransportHandle`]: crate::mcp::handle::TransportHandle

use std::collections::HashMap;

use serde_json::Value;

use crate::mcp::registry::EntryStatus;
use crate::models::{ServerConfig, TransportKind};
use crate::services::credential_provider::Credential;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing credential for namespace '{0}'")]
    MissingCredential(String),

    #[error("Invalid transport config: {0}")]
    InvalidConfig(String),

    #[error("Unsupported transport kind '{0}'")]
    Unsupported(String),

    #[error("Build timed out after {0}ms")]
    Timeout(u64),
}

impl BuildError {
    /// The registry status an entry carries when this error is its outcome.
    pub fn status(&self) -> EntryStatus {
        match self {
            BuildError::MissingCredential(_) => EntryStatus::MissingCredential,
            BuildError::InvalidConfig(_) => EntryStatus::InvalidConfig,
            BuildError::Unsupported(_) => EntryStatus::Unsupported,
            BuildError::Timeout(_) => EntryStatus::TimedOut,
        }
    }
}

/// Validated connection recipe for one server.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportDescriptor {
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    Http {
        url: reqwest::Url,
        headers: Vec<(String, String)>,
    },
    Sse {
        url: reqwest::Url,
        headers: Vec<(String, String)>,
    },
}

impl TransportDescriptor {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportDescriptor::Stdio { .. } => TransportKind::Stdio,
            TransportDescriptor::Http { .. } => TransportKind::Http,
            TransportDescriptor::Sse { .. } => TransportKind::Sse,
        }
    }
}

/// Unwrap the legacy URL envelope.
///
/// Fallback order: if the stored value looks like a JSON object carrying a
/// `"source"` key, parse it and take its `"url"` field; on any parse or
/// shape failure the raw string is the URL.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.contains("\"source\"") {
        if let Ok(Value::Object(envelope)) = serde_json::from_str::<Value>(trimmed) {
            if let Some(url) = envelope.get("url").and_then(Value::as_str) {
                return url.to_string();
            }
        }
    }
    raw.to_string()
}

pub struct TransportBuilder;

impl TransportBuilder {
    /// Build a connectable descriptor from a configuration and its resolved
    /// credential.
    ///
    /// Credentials attach as an `Authorization` (or declared) header on
    /// http/sse transports, and through the declared env var on stdio
    /// transports. A missing credential is not a build failure here; the
    /// orchestrator builds credential-less and marks the entry instead.
    pub fn build(
        config: &ServerConfig,
        credential: Option<&Credential>,
    ) -> Result<TransportDescriptor, BuildError> {
        match &config.transport_kind {
            TransportKind::Stdio => Self::build_stdio(config, credential),
            TransportKind::Http => {
                let (url, headers) = Self::resolve_endpoint(config, credential)?;
                Ok(TransportDescriptor::Http { url, headers })
            }
            TransportKind::Sse => {
                let (url, headers) = Self::resolve_endpoint(config, credential)?;
                Ok(TransportDescriptor::Sse { url, headers })
            }
            TransportKind::Unrecognized(kind) => Err(BuildError::Unsupported(kind.clone())),
        }
    }

    fn build_stdio(
        config: &ServerConfig,
        credential: Option<&Credential>,
    ) -> Result<TransportDescriptor, BuildError> {
        let command = config
            .transport_params
            .command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                BuildError::InvalidConfig(format!(
                    "stdio server '{}' declares no command",
                    config.name
                ))
            })?;

        let mut env = config.transport_params.env.clone();
        if let (Some(credential), Some(var)) = (credential, config.auth_settings.env_var.as_deref())
        {
            env.insert(var.to_string(), credential.secret().to_string());
        }

        Ok(TransportDescriptor::Stdio {
            command: command.to_string(),
            args: config.transport_params.args.clone(),
            env,
        })
    }

    fn resolve_endpoint(
        config: &ServerConfig,
        credential: Option<&Credential>,
    ) -> Result<(reqwest::Url, Vec<(String, String)>), BuildError> {
        let raw = config
            .transport_params
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                BuildError::InvalidConfig(format!(
                    "{} server '{}' declares no URL",
                    config.transport_kind, config.name
                ))
            })?;

        let normalized = normalize_url(raw);
        let url = reqwest::Url::parse(&normalized).map_err(|e| {
            BuildError::InvalidConfig(format!("unparsable URL '{}': {}", normalized, e))
        })?;

        let mut headers = Vec::new();
        if let Some(credential) = credential {
            let (name, value) = credential.header();
            // Reject header names the HTTP client would refuse later.
            reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                BuildError::InvalidConfig(format!("invalid credential header '{}': {}", name, e))
            })?;
            headers.push((name, value));
        }

        Ok((url, headers))
    }
}
