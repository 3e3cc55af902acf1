pub mod credential_provider;
pub mod scope_resolver;

pub use credential_provider::{Credential, CredentialError, CredentialProvider};
pub use scope_resolver::ScopeResolver;
