//! The composed registry: the read-only result of one composition call.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::mcp::handle::TransportHandle;
use crate::models::Scope;

/// Per-entry outcome of a composition.
///
/// Anything other than `Ok` keeps the entry visible for inspection (so a UI
/// can prompt for re-authorization) while excluding it from the invokable
/// set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Ok,
    MissingCredential,
    InvalidConfig,
    Unsupported,
    TimedOut,
}

impl EntryStatus {
    pub fn is_usable(self) -> bool {
        matches!(self, EntryStatus::Ok)
    }
}

/// A pre-built server supplied directly by the caller.
///
/// These bypass scope resolution entirely: no prefix, highest priority,
/// never shadowed by scoped entries.
#[derive(Debug, Clone)]
pub struct CallerServer {
    pub name: String,
    pub namespace: String,
    pub handle: Arc<TransportHandle>,
}

/// One entry of a [`ComposedRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    name: String,
    namespace: String,
    /// `None` marks a caller-supplied entry.
    scope: Option<Scope>,
    status: EntryStatus,
    handle: Option<Arc<TransportHandle>>,
}

impl RegistryEntry {
    pub(crate) fn scoped(
        name: String,
        namespace: String,
        scope: Scope,
        status: EntryStatus,
        handle: Option<Arc<TransportHandle>>,
    ) -> Self {
        Self {
            name,
            namespace,
            scope: Some(scope),
            status,
            handle,
        }
    }

    pub(crate) fn caller(name: String, namespace: String, handle: Arc<TransportHandle>) -> Self {
        Self {
            name,
            namespace,
            scope: None,
            status: EntryStatus::Ok,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// The transport handle, when one was constructed. Present for `Ok`
    /// entries and for `MissingCredential` entries whose transport could
    /// still be described; calling the latter fails at the transport
    /// layer, which callers opt into by ignoring the status.
    pub fn handle(&self) -> Option<&Arc<TransportHandle>> {
        self.handle.as_ref()
    }
}

/// The merged, uniquely-named set of server connections for one agent turn.
///
/// Composition is one-shot: the registry has no mutation surface and is
/// discarded with the turn or session. Iteration order is name order, so
/// identical inputs enumerate identically.
#[derive(Debug, Default)]
pub struct ComposedRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl ComposedRegistry {
    pub(crate) fn from_entries(entries: Vec<RegistryEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub fn status(&self, name: &str) -> Option<EntryStatus> {
        self.entries.get(name).map(RegistryEntry::status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries the agent runtime may actually invoke.
    pub fn usable(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values().filter(|e| e.status.is_usable())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::TransportDescriptor;
    use std::time::Duration;

    fn handle() -> Arc<TransportHandle> {
        let url = reqwest::Url::parse("https://x.example/mcp").unwrap();
        Arc::new(TransportHandle::new(
            TransportDescriptor::Http {
                url,
                headers: Vec::new(),
            },
            Duration::from_secs(5),
        ))
    }

    #[test]
    fn usable_excludes_degraded_entries() {
        let registry = ComposedRegistry::from_entries(vec![
            RegistryEntry::scoped(
                "system_search".to_string(),
                "search/server".to_string(),
                Scope::Platform,
                EntryStatus::Ok,
                Some(handle()),
            ),
            RegistryEntry::scoped(
                "user_drive".to_string(),
                "drive/server".to_string(),
                Scope::User,
                EntryStatus::MissingCredential,
                Some(handle()),
            ),
        ]);

        let usable: Vec<&str> = registry.usable().map(RegistryEntry::name).collect();
        assert_eq!(usable, vec!["system_search"]);

        // Degraded entry stays visible with its handle for inspection.
        let degraded = registry.get("user_drive").unwrap();
        assert_eq!(degraded.status(), EntryStatus::MissingCredential);
        assert!(degraded.handle().is_some());
    }

    #[test]
    fn iteration_is_name_ordered() {
        let registry = ComposedRegistry::from_entries(vec![
            RegistryEntry::caller("zeta".to_string(), "z/server".to_string(), handle()),
            RegistryEntry::caller("alpha".to_string(), "a/server".to_string(), handle()),
        ]);

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
