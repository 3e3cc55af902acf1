//! weavemcp: identity-scoped MCP server composition.
//!
//! Given an identity (user, organization, project), the engine resolves
//! which configured MCP tool servers apply across configuration scopes,
//! attaches the right authentication material (static secrets or the latest
//! OAuth token), builds a connectable transport per server, and merges
//! everything into one uniquely-named [`ComposedRegistry`] the agent
//! runtime calls through without knowing server topology.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weavemcp::models::Identity;
//! use weavemcp::repositories::{PostgrestClient, RowQueryConfigRepository, RowQueryTokenRepository};
//! use weavemcp::{Composer, EngineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(PostgrestClient::new("https://store.example", None)?);
//! let composer = Composer::new(
//!     Some(Arc::new(RowQueryConfigRepository::new(store.clone()))),
//!     Some(Arc::new(RowQueryTokenRepository::new(store))),
//!     EngineConfig::from_env(),
//! );
//!
//! let identity = Identity::user("u1").with_organization("o1");
//! let registry = composer.compose(&identity, Vec::new()).await?;
//! for entry in registry.usable() {
//!     println!("{} ({})", entry.name(), entry.namespace());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mcp;
pub mod models;
pub mod repositories;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

pub use config::EngineConfig;
pub use error::ComposeError;
pub use mcp::composer::Composer;
pub use mcp::registry::{CallerServer, ComposedRegistry, EntryStatus, RegistryEntry};
