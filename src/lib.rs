// OpenWhisk provider - credential resolution and authenticated client construction

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http_client;
pub mod provider;
pub mod resolver;

pub use error::{ProviderError, Result};
pub use provider::{Provider, PROVIDER_NAME};
