mod oauth;
mod server;

pub use oauth::{OAuthConfig, ProviderConfig};
pub use server::ServerConfig;
