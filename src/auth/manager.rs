use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, Utc};

use super::cli::CliTokenManager;
use super::iam::IamTokenManager;
use super::types::Token;
use crate::error::Result;

/// Tokens are treated as expired this many seconds before their actual expiry
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Check whether a token is expired or inside the safety margin
pub fn is_expired(token: &Token) -> bool {
    match token.expires_at {
        None => false,
        Some(exp) => Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= exp,
    }
}

/// Fixed `key:secret` credential. Never refreshes, never performs I/O.
#[derive(Clone, PartialEq)]
pub struct StaticAuthHandler {
    value: String,
}

impl StaticAuthHandler {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn get_token(&self) -> Token {
        Token::new(self.value.clone(), None)
    }
}

impl std::fmt::Debug for StaticAuthHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAuthHandler")
            .field("value", &redact(&self.value))
            .finish()
    }
}

/// Authentication strategy attached to a client
#[derive(Debug)]
pub enum AuthHandler {
    Static(StaticAuthHandler),
    Iam(IamTokenManager),
    Cli(CliTokenManager),
}

impl AuthHandler {
    /// Get a valid token, refreshing on demand
    pub async fn get_token(&self) -> Result<Token> {
        match self {
            AuthHandler::Static(handler) => Ok(handler.get_token()),
            AuthHandler::Iam(manager) => manager.get_token().await,
            AuthHandler::Cli(manager) => manager.get_token().await,
        }
    }

    pub fn is_expired(&self, token: &Token) -> bool {
        match self {
            AuthHandler::Static(_) => false,
            AuthHandler::Iam(_) | AuthHandler::Cli(_) => is_expired(token),
        }
    }

    /// Value for the `Authorization` header
    pub async fn authorization(&self) -> Result<String> {
        let token = self.get_token().await?;
        Ok(match self {
            AuthHandler::Static(_) => format!("Basic {}", STANDARD.encode(token.value)),
            AuthHandler::Iam(_) | AuthHandler::Cli(_) => format!("Bearer {}", token.value),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuthHandler::Static(_) => "static",
            AuthHandler::Iam(_) => "iam",
            AuthHandler::Cli(_) => "cli",
        }
    }
}

/// Keep only a short prefix of a secret for logs and debug output
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}...", prefix)
}
