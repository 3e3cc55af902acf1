pub mod identity;
pub mod server;
pub mod token;

pub use identity::Identity;
pub use server::{
    AuthSettings, AuthType, MergeStrategy, Scope, ServerConfig, TransportKind, TransportParams,
};
pub use token::OAuthToken;
