use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Configuration tier a server belongs to.
///
/// The variants are closed on purpose: merge behaviour is selected by
/// exhaustive match, never by string comparison on stored scope values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Platform,
    Organization,
    User,
    Project,
}

/// How a built handle is merged into the registry.
///
/// `Link` shares one live handle across compositions (amortizes connection
/// setup for shared infrastructure); `Copy` instantiates a session-private
/// handle so per-user servers never leak state across concurrent sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Link,
    Copy,
}

impl Scope {
    /// Prefix used when building composed registry names.
    pub fn prefix(self) -> &'static str {
        match self {
            Scope::Platform => "system",
            Scope::Organization => "org",
            Scope::User => "user",
            Scope::Project => "project",
        }
    }

    /// Collision-resolution priority; higher shadows lower only through
    /// distinct composed names, never by overwrite.
    pub fn priority(self) -> u8 {
        match self {
            Scope::Platform => 0,
            Scope::Organization => 1,
            Scope::User => 2,
            Scope::Project => 3,
        }
    }

    pub fn merge_strategy(self) -> MergeStrategy {
        match self {
            Scope::Platform | Scope::Organization => MergeStrategy::Link,
            Scope::User | Scope::Project => MergeStrategy::Copy,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Platform => "platform",
            Scope::Organization => "organization",
            Scope::User => "user",
            Scope::Project => "project",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "platform" => Ok(Scope::Platform),
            "organization" | "org" => Ok(Scope::Organization),
            "user" => Ok(Scope::User),
            "project" => Ok(Scope::Project),
            other => Err(format!("unknown scope '{}'", other)),
        }
    }
}

/// Transport mechanism declared on a server configuration.
///
/// Unrecognized kinds from stored rows are preserved instead of failing the
/// whole row set, so the entry can surface `Unsupported` in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransportKind {
    Stdio,
    Http,
    Sse,
    Unrecognized(String),
}

impl From<String> for TransportKind {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => TransportKind::Stdio,
            "http" => TransportKind::Http,
            "sse" => TransportKind::Sse,
            _ => TransportKind::Unrecognized(s),
        }
    }
}

impl From<TransportKind> for String {
    fn from(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Stdio => "stdio".to_string(),
            TransportKind::Http => "http".to_string(),
            TransportKind::Sse => "sse".to_string(),
            TransportKind::Unrecognized(s) => s,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Http => write!(f, "http"),
            TransportKind::Sse => write!(f, "sse"),
            TransportKind::Unrecognized(s) => write!(f, "{}", s),
        }
    }
}

/// Authentication mode declared on a server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    None,
    Bearer,
    ApiKey,
    #[serde(rename = "oauth")]
    OAuth,
}

impl FromStr for AuthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(AuthType::None),
            "bearer" => Ok(AuthType::Bearer),
            "api_key" | "apikey" => Ok(AuthType::ApiKey),
            "oauth" => Ok(AuthType::OAuth),
            other => Err(format!("unknown auth type '{}'", other)),
        }
    }
}

/// Connection parameters; which fields apply depends on the transport kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportParams {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// For http/sse servers. May still carry the legacy JSON envelope
    /// `{"url":...,"source":...}`; unwrapping happens at build time.
    #[serde(default)]
    pub url: Option<String>,
}

/// Static authentication material stored alongside the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub secret: Option<String>,
    /// Provider-specific header to carry the credential in, when the
    /// default `Authorization: Bearer` form does not apply.
    #[serde(default)]
    pub header_name: Option<String>,
    /// Environment variable to inject the credential into for stdio
    /// transports.
    #[serde(default)]
    pub env_var: Option<String>,
}

/// One configured tool server, read-only to the composition engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    pub name: String,
    /// Stable routing key, e.g. `drive/server`. OAuth tokens are looked up
    /// by this namespace, and link-strategy caching keys on it.
    pub namespace: String,
    pub scope: Scope,
    pub transport_kind: TransportKind,
    #[serde(default)]
    pub transport_params: TransportParams,
    pub auth_type: AuthType,
    #[serde(default)]
    pub auth_settings: AuthSettings,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_priority_orders_platform_lowest() {
        assert!(Scope::Platform.priority() < Scope::Organization.priority());
        assert!(Scope::Organization.priority() < Scope::User.priority());
        assert!(Scope::User.priority() < Scope::Project.priority());
    }

    #[test]
    fn merge_strategy_links_shared_scopes() {
        assert_eq!(Scope::Platform.merge_strategy(), MergeStrategy::Link);
        assert_eq!(Scope::Organization.merge_strategy(), MergeStrategy::Link);
        assert_eq!(Scope::User.merge_strategy(), MergeStrategy::Copy);
        assert_eq!(Scope::Project.merge_strategy(), MergeStrategy::Copy);
    }

    #[test]
    fn transport_kind_preserves_unrecognized_values() {
        assert_eq!(TransportKind::from("stdio".to_string()), TransportKind::Stdio);
        assert_eq!(TransportKind::from("SSE".to_string()), TransportKind::Sse);
        assert_eq!(
            TransportKind::from("grpc".to_string()),
            TransportKind::Unrecognized("grpc".to_string())
        );
    }

    #[test]
    fn auth_type_parses_stored_values() {
        assert_eq!("bearer".parse::<AuthType>().unwrap(), AuthType::Bearer);
        assert_eq!("api_key".parse::<AuthType>().unwrap(), AuthType::ApiKey);
        assert_eq!("oauth".parse::<AuthType>().unwrap(), AuthType::OAuth);
        assert!("kerberos".parse::<AuthType>().is_err());
    }

    #[test]
    fn server_config_round_trips_through_json() {
        let config = ServerConfig {
            id: "srv-1".to_string(),
            name: "drive".to_string(),
            namespace: "drive/server".to_string(),
            scope: Scope::User,
            transport_kind: TransportKind::Http,
            transport_params: TransportParams {
                url: Some("https://drive.example/mcp".to_string()),
                ..Default::default()
            },
            auth_type: AuthType::OAuth,
            auth_settings: AuthSettings::default(),
            enabled: true,
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"scope\":\"user\""));
        assert!(json.contains("\"auth_type\":\"oauth\""));
        assert!(json.contains("\"transport_kind\":\"http\""));

        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
