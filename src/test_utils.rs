pub mod test_helpers {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{Duration as ChronoDuration, Utc};

    use crate::mcp::handle::TransportHandle;
    use crate::mcp::transport::TransportDescriptor;
    use crate::models::{
        AuthSettings, AuthType, Identity, OAuthToken, Scope, ServerConfig, TransportKind,
        TransportParams,
    };

    /// Identity used throughout the test suites.
    pub fn test_identity() -> Identity {
        Identity::user("u1").with_organization("o1")
    }

    pub fn http_server(name: &str, scope: Scope, url: &str) -> ServerConfig {
        ServerConfig {
            id: format!("id-{}-{}", scope, name),
            name: name.to_string(),
            namespace: format!("{}/server", name),
            scope,
            transport_kind: TransportKind::Http,
            transport_params: TransportParams {
                url: Some(url.to_string()),
                ..Default::default()
            },
            auth_type: AuthType::None,
            auth_settings: AuthSettings::default(),
            enabled: true,
        }
    }

    pub fn bearer_server(name: &str, scope: Scope, url: &str, secret: &str) -> ServerConfig {
        let mut config = http_server(name, scope, url);
        config.auth_type = AuthType::Bearer;
        config.auth_settings.secret = Some(secret.to_string());
        config
    }

    pub fn oauth_server(name: &str, scope: Scope, url: &str) -> ServerConfig {
        let mut config = http_server(name, scope, url);
        config.auth_type = AuthType::OAuth;
        config
    }

    pub fn stdio_server(name: &str, scope: Scope, command: &str) -> ServerConfig {
        let mut config = http_server(name, scope, "unused");
        config.transport_kind = TransportKind::Stdio;
        config.transport_params = TransportParams {
            command: Some(command.to_string()),
            ..Default::default()
        };
        config
    }

    pub fn user_token(namespace: &str, user_id: &str, expires_in_secs: i64) -> OAuthToken {
        let now = Utc::now();
        OAuthToken {
            namespace: namespace.to_string(),
            access_token: format!("at-{}", namespace),
            refresh_token: Some(format!("rt-{}", namespace)),
            token_type: "Bearer".to_string(),
            scope: None,
            issued_at: now,
            expires_at: now + ChronoDuration::seconds(expires_in_secs),
            user_id: Some(user_id.to_string()),
            organization_id: None,
        }
    }

    /// A pre-built handle for caller-supplied server tests. Never
    /// connected.
    pub fn prebuilt_handle(url: &str) -> Arc<TransportHandle> {
        let url = reqwest::Url::parse(url).expect("test URL must parse");
        Arc::new(TransportHandle::new(
            TransportDescriptor::Http {
                url,
                headers: Vec::new(),
            },
            Duration::from_secs(5),
        ))
    }
}
