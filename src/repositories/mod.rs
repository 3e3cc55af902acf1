//! Read-only access to the configuration and credential stores.
//!
//! The stores themselves are external collaborators reached through the
//! opaque [`RowQuery`] interface (a PostgREST-shaped HTTP API in
//! production). Everything here is a read; the compose path never writes.

pub mod config_repository;
pub mod memory;
pub mod row_query;
pub mod token_repository;

pub use config_repository::{RowQueryConfigRepository, ServerConfigRepository, SERVER_TABLE};
pub use memory::{InMemoryConfigRepository, InMemoryTokenRepository};
pub use row_query::{PostgrestClient, RowQuery, StoreError};
pub use token_repository::{RowQueryTokenRepository, TokenRepository, TOKEN_TABLE};
