// Authentication module
// Token managers for the three supported credential strategies

mod cli;
mod iam;
mod manager;
mod types;

pub use cli::{default_profile_path, CliTokenManager};
pub use iam::{IamTokenManager, DEFAULT_IAM_ENDPOINT};
pub use manager::{is_expired, redact, AuthHandler, StaticAuthHandler, EXPIRY_MARGIN_SECS};
pub use types::Token;
