//! The composition orchestrator.
//!
//! Drives scope resolution, per-server credential and transport builds, and
//! the deterministic merge into a [`ComposedRegistry`]. Per-server builds
//! fan out concurrently under a bounded semaphore; each one has its own
//! timeout and its failures are isolated to its entry. The overall call
//! fails only on a malformed identity or caller cancellation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::ComposeError;
use crate::mcp::cache::LinkCache;
use crate::mcp::handle::TransportHandle;
use crate::mcp::registry::{CallerServer, ComposedRegistry, EntryStatus, RegistryEntry};
use crate::mcp::transport::{BuildError, TransportBuilder};
use crate::models::{Identity, MergeStrategy, ServerConfig};
use crate::repositories::config_repository::ServerConfigRepository;
use crate::repositories::token_repository::TokenRepository;
use crate::services::credential_provider::{CredentialError, CredentialProvider};
use crate::services::scope_resolver::ScopeResolver;

/// The engine's sole public entry point.
///
/// Owns the resolver, the credential provider, and the injected link cache;
/// construct one per process (or per store wiring) and call
/// [`compose`](Self::compose) per request.
pub struct Composer {
    resolver: ScopeResolver,
    credentials: CredentialProvider,
    cache: Arc<LinkCache>,
    engine: EngineConfig,
}

struct BuiltOutcome {
    config: ServerConfig,
    status: EntryStatus,
    handle: Option<Arc<TransportHandle>>,
}

impl Composer {
    pub fn new(
        configs: Option<Arc<dyn ServerConfigRepository>>,
        tokens: Option<Arc<dyn TokenRepository>>,
        engine: EngineConfig,
    ) -> Self {
        Self {
            resolver: ScopeResolver::new(configs),
            credentials: CredentialProvider::new(tokens),
            cache: Arc::new(LinkCache::new()),
            engine,
        }
    }

    /// Share a link cache across composers, or hand one in for external
    /// invalidation wiring.
    pub fn with_cache(mut self, cache: Arc<LinkCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<LinkCache> {
        &self.cache
    }

    /// Compose the registry for an identity.
    ///
    /// Never fails on per-server trouble: unreachable stores, missing
    /// credentials, malformed configs and slow builds all degrade to entry
    /// statuses in the returned registry.
    pub async fn compose(
        &self,
        identity: &Identity,
        caller_servers: Vec<CallerServer>,
    ) -> Result<ComposedRegistry, ComposeError> {
        self.compose_with_cancel(identity, caller_servers, CancellationToken::new())
            .await
    }

    /// [`compose`](Self::compose) with caller-initiated cancellation.
    ///
    /// On cancellation in-flight builds are abandoned and no partial
    /// registry is returned.
    pub async fn compose_with_cancel(
        &self,
        identity: &Identity,
        caller_servers: Vec<CallerServer>,
        cancel: CancellationToken,
    ) -> Result<ComposedRegistry, ComposeError> {
        identity.validate()?;

        let composition_id = uuid::Uuid::new_v4();
        let configs = self.resolver.resolve(identity).await;
        tracing::info!(
            composition_id = %composition_id,
            user_id = %identity.user_id,
            organization_id = identity.organization_id.as_deref().unwrap_or(""),
            servers = configs.len(),
            caller_servers = caller_servers.len(),
            "composing MCP registry"
        );

        if cancel.is_cancelled() {
            return Err(ComposeError::Cancelled);
        }

        let permits = Arc::new(Semaphore::new(self.engine.max_concurrency.max(1)));
        let mut builds: JoinSet<BuiltOutcome> = JoinSet::new();
        for config in configs {
            let permits = Arc::clone(&permits);
            let credentials = self.credentials.clone();
            let cache = Arc::clone(&self.cache);
            let identity = identity.clone();
            let build_timeout = self.engine.build_timeout;
            let request_timeout = self.engine.request_timeout;

            builds.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let fallback = config.clone();
                match tokio::time::timeout(
                    build_timeout,
                    build_entry(config, identity, credentials, cache, request_timeout),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        let error = BuildError::Timeout(build_timeout.as_millis() as u64);
                        tracing::warn!(server = %fallback.name, error = %error, "server build timed out");
                        BuiltOutcome {
                            config: fallback,
                            status: error.status(),
                            handle: None,
                        }
                    }
                }
            });
        }

        let mut outcomes = Vec::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    builds.shutdown().await;
                    tracing::info!(composition_id = %composition_id, "composition cancelled");
                    return Err(ComposeError::Cancelled);
                }
                next = builds.join_next() => match next {
                    Some(Ok(outcome)) => outcomes.push(outcome),
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "server build task failed");
                    }
                    None => break,
                }
            }
        }

        let registry = merge(outcomes, caller_servers);
        tracing::info!(
            composition_id = %composition_id,
            entries = registry.len(),
            usable = registry.usable().count(),
            "composition complete"
        );
        Ok(registry)
    }
}

async fn build_entry(
    config: ServerConfig,
    identity: Identity,
    credentials: CredentialProvider,
    cache: Arc<LinkCache>,
    request_timeout: Duration,
) -> BuiltOutcome {
    let credential = match credentials.resolve(&config, &identity).await {
        Ok(credential) => credential,
        Err(CredentialError::Missing(namespace)) => {
            tracing::debug!(
                server = %config.name,
                namespace = %namespace,
                "no usable credential, entry needs authorization"
            );
            // Still describe the transport so the entry stays inspectable;
            // never cache a credential-less handle.
            return match TransportBuilder::build(&config, None) {
                Ok(descriptor) => BuiltOutcome {
                    handle: Some(Arc::new(TransportHandle::new(descriptor, request_timeout))),
                    status: EntryStatus::MissingCredential,
                    config,
                },
                Err(e) => BuiltOutcome {
                    status: e.status(),
                    handle: None,
                    config,
                },
            };
        }
    };

    let built = match config.scope.merge_strategy() {
        MergeStrategy::Link => {
            let build_config = config.clone();
            let build_credential = credential.clone();
            cache
                .get_or_build(&config.namespace, config.scope, move || async move {
                    TransportBuilder::build(&build_config, build_credential.as_ref())
                        .map(|descriptor| Arc::new(TransportHandle::new(descriptor, request_timeout)))
                })
                .await
        }
        MergeStrategy::Copy => TransportBuilder::build(&config, credential.as_ref())
            .map(|descriptor| Arc::new(TransportHandle::new(descriptor, request_timeout))),
    };

    match built {
        Ok(handle) => BuiltOutcome {
            status: EntryStatus::Ok,
            handle: Some(handle),
            config,
        },
        Err(e) => {
            tracing::warn!(server = %config.name, error = %e, "failed to build server transport");
            BuiltOutcome {
                status: e.status(),
                handle: None,
                config,
            }
        }
    }
}

/// Deterministic merge: results are sorted after collection, so registry
/// contents never depend on which build finished first. Caller-supplied
/// names are reserved up front and can therefore never be shadowed.
fn merge(mut outcomes: Vec<BuiltOutcome>, caller_servers: Vec<CallerServer>) -> ComposedRegistry {
    outcomes.sort_by(|a, b| {
        (a.config.scope.priority(), a.config.name.as_str(), a.config.id.as_str()).cmp(&(
            b.config.scope.priority(),
            b.config.name.as_str(),
            b.config.id.as_str(),
        ))
    });

    let mut taken = HashSet::new();
    let mut caller_entries = Vec::with_capacity(caller_servers.len());
    for caller in caller_servers {
        let name = reserve_unique(&mut taken, caller.name);
        caller_entries.push(RegistryEntry::caller(name, caller.namespace, caller.handle));
    }

    let mut entries = Vec::with_capacity(outcomes.len() + caller_entries.len());
    for outcome in outcomes {
        let base = format!(
            "{}_{}",
            outcome.config.scope.prefix(),
            sanitize_name(&outcome.config.name)
        );
        let name = reserve_unique(&mut taken, base);
        entries.push(RegistryEntry::scoped(
            name,
            outcome.config.namespace,
            outcome.config.scope,
            outcome.status,
            outcome.handle,
        ));
    }
    entries.extend(caller_entries);

    ComposedRegistry::from_entries(entries)
}

/// Composed names are agent-facing identifiers; anything outside
/// `[a-z0-9_-]` becomes an underscore.
fn sanitize_name(raw: &str) -> String {
    let mut sanitized = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            sanitized.push(c);
        } else {
            sanitized.push('_');
        }
    }
    if sanitized.is_empty() {
        sanitized.push_str("server");
    }
    sanitized
}

fn reserve_unique(taken: &mut HashSet<String>, base: String) -> String {
    if taken.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
