//! Scope resolution: which configured servers apply to an identity.

use std::sync::Arc;

use crate::models::{Identity, Scope, ServerConfig};
use crate::repositories::config_repository::ServerConfigRepository;

/// Resolves the ordered set of enabled server configurations for an
/// identity, walking platform → organization → user → project.
///
/// The resolver never fails: with no store configured, or with the store
/// unreachable, composition degrades to "no extra tools". Ordering only
/// matters for collision priority downstream; shadowing is expressed by
/// distinct composed names, not by dropping entries.
pub struct ScopeResolver {
    configs: Option<Arc<dyn ServerConfigRepository>>,
}

impl ScopeResolver {
    pub fn new(configs: Option<Arc<dyn ServerConfigRepository>>) -> Self {
        Self { configs }
    }

    fn scopes_for(identity: &Identity) -> Vec<Scope> {
        let mut scopes = vec![Scope::Platform];
        if identity.organization_id.is_some() {
            scopes.push(Scope::Organization);
        }
        scopes.push(Scope::User);
        if identity.project_id.is_some() {
            scopes.push(Scope::Project);
        }
        scopes
    }

    pub async fn resolve(&self, identity: &Identity) -> Vec<ServerConfig> {
        let Some(repo) = &self.configs else {
            tracing::debug!("no configuration store wired, composing without scoped servers");
            return Vec::new();
        };

        let mut resolved = Vec::new();
        let mut store_warned = false;
        for scope in Self::scopes_for(identity) {
            match repo.list_enabled(scope, identity).await {
                Ok(configs) => {
                    tracing::debug!(scope = %scope, count = configs.len(), "resolved scope");
                    resolved.extend(configs.into_iter().filter(|c| c.enabled));
                }
                Err(e) => {
                    // One warning per resolve call, not one per scope.
                    if !store_warned {
                        tracing::warn!(
                            user_id = %identity.user_id,
                            error = %e,
                            "configuration store unavailable, continuing without it"
                        );
                        store_warned = true;
                    }
                }
            }
        }
        resolved
    }
}
