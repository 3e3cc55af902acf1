//! Shared handle cache for link-merged servers.
//!
//! Platform- and organization-scoped servers are shared infrastructure: one
//! live handle is built once and reused across compositions. The cache is
//! the engine's only mutable shared state. It is constructed explicitly and
//! injected into the orchestrator; there are no process-wide singletons.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::mcp::handle::TransportHandle;
use crate::mcp::transport::BuildError;
use crate::models::Scope;

type CacheKey = (String, Scope);
type Slot = Arc<Mutex<Option<Arc<TransportHandle>>>>;

/// Cache of live handles keyed by `(namespace, scope)`.
///
/// Each key has its own lock, so concurrent compositions for different
/// users building the same shared server serialize on that one key without
/// blocking each other's unrelated builds. Invalidation hooks exist for
/// external configuration-update events.
#[derive(Debug, Default)]
pub struct LinkCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl LinkCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, namespace: &str, scope: Scope) -> Slot {
        let mut slots = self.slots.lock().await;
        slots
            .entry((namespace.to_string(), scope))
            .or_default()
            .clone()
    }

    /// Return the cached handle for the key, or run `build` under the
    /// per-key lock and cache its result. Failed builds leave the slot
    /// empty so the next composition retries.
    pub async fn get_or_build<F, Fut>(
        &self,
        namespace: &str,
        scope: Scope,
        build: F,
    ) -> Result<Arc<TransportHandle>, BuildError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<TransportHandle>, BuildError>>,
    {
        let slot = self.slot(namespace, scope).await;
        let mut guard = slot.lock().await;

        if let Some(handle) = guard.as_ref() {
            tracing::debug!(namespace = %namespace, scope = %scope, "link cache hit");
            return Ok(Arc::clone(handle));
        }

        let handle = build().await?;
        *guard = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Drop the cached handle for one server; the next composition
    /// rebuilds it. Wired to external configuration-update events.
    pub async fn invalidate(&self, namespace: &str, scope: Scope) {
        let removed = {
            let mut slots = self.slots.lock().await;
            slots.remove(&(namespace.to_string(), scope))
        };
        if let Some(slot) = removed {
            if let Some(handle) = slot.lock().await.take() {
                handle.disconnect().await;
            }
            tracing::debug!(namespace = %namespace, scope = %scope, "link cache entry invalidated");
        }
    }

    pub async fn invalidate_all(&self) {
        let drained: Vec<Slot> = {
            let mut slots = self.slots.lock().await;
            slots.drain().map(|(_, slot)| slot).collect()
        };
        for slot in drained {
            if let Some(handle) = slot.lock().await.take() {
                handle.disconnect().await;
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn handle() -> Arc<TransportHandle> {
        let url = reqwest::Url::parse("https://shared.example/mcp").unwrap();
        Arc::new(TransportHandle::new(
            crate::mcp::transport::TransportDescriptor::Http {
                url,
                headers: Vec::new(),
            },
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn warm_cache_returns_the_same_handle() {
        let cache = LinkCache::new();

        let first = cache
            .get_or_build("crm/server", Scope::Organization, || async { Ok(handle()) })
            .await
            .unwrap();
        let second = cache
            .get_or_build("crm/server", Scope::Organization, || async {
                panic!("builder must not run on a warm cache")
            })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn keys_separate_namespaces_and_scopes() {
        let cache = LinkCache::new();

        let org = cache
            .get_or_build("crm/server", Scope::Organization, || async { Ok(handle()) })
            .await
            .unwrap();
        let platform = cache
            .get_or_build("crm/server", Scope::Platform, || async { Ok(handle()) })
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&org, &platform));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_builds_for_one_key_run_once() {
        let cache = Arc::new(LinkCache::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let builds = Arc::clone(&builds);
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_build("search/server", Scope::Platform, move || async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(handle())
                    })
                    .await
                    .unwrap()
            }));
        }

        let handles: Vec<Arc<TransportHandle>> = futures_join(tasks).await;
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    async fn futures_join(
        tasks: Vec<tokio::task::JoinHandle<Arc<TransportHandle>>>,
    ) -> Vec<Arc<TransportHandle>> {
        let mut out = Vec::with_capacity(tasks.len());
        for task in tasks {
            out.push(task.await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn failed_builds_are_retried() {
        let cache = LinkCache::new();

        let first = cache
            .get_or_build("flaky/server", Scope::Platform, || async {
                Err(BuildError::InvalidConfig("boom".to_string()))
            })
            .await;
        assert!(first.is_err());

        let second = cache
            .get_or_build("flaky/server", Scope::Platform, || async { Ok(handle()) })
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn invalidation_forces_a_rebuild() {
        let cache = LinkCache::new();

        let first = cache
            .get_or_build("crm/server", Scope::Organization, || async { Ok(handle()) })
            .await
            .unwrap();

        cache.invalidate("crm/server", Scope::Organization).await;

        let second = cache
            .get_or_build("crm/server", Scope::Organization, || async { Ok(handle()) })
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }
}
