//! MCP composition: transports, the link cache, and the orchestrator.
//!
//! The pipeline runs resolver → credential provider → transport builder per
//! configured server, fans the builds out concurrently, and merges the
//! results into a [`ComposedRegistry`] under deterministic, collision-free
//! names.
//!
//! # Architecture
//!
//! - [`client`] - JSON-RPC 2.0 plumbing over stdio and streamable HTTP
//! - [`transport`] - per-server validation and descriptor construction
//! - [`handle`] - lazily-connecting handle exposing list/call/status
//! - [`cache`] - shared handles for link-merged (platform/org) servers
//! - [`composer`] - the orchestrator behind [`Composer::compose`]
//! - [`registry`] - the read-only result surface
//!
//! [`Composer::compose`]: composer::Composer::compose
//! [`ComposedRegistry`]: registry::ComposedRegistry

pub mod cache;
pub mod client;
pub mod composer;
pub mod handle;
pub mod registry;
pub mod transport;

pub use cache::LinkCache;
pub use client::{McpClientError, ToolDescriptor, ToolOutcome};
pub use composer::Composer;
pub use handle::TransportHandle;
pub use registry::{CallerServer, ComposedRegistry, EntryStatus, RegistryEntry};
pub use transport::{BuildError, TransportBuilder, TransportDescriptor};
