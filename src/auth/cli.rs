// Bearer tokens borrowed from the IBM Cloud CLI login profile

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::Mutex;

use super::manager::is_expired;
use super::types::{CliOAuthTokens, CliProfile, JwtClaims, Token};
use crate::error::{ProviderError, Result};

const CLI_PROGRAM: &str = "ibmcloud";
const CLI_REFRESH_ARGS: [&str; 4] = ["iam", "oauth-tokens", "--output", "json"];

/// Default location of the CLI profile: `$IBMCLOUD_HOME/.bluemix/config.json` or `~/.bluemix/config.json`
pub fn default_profile_path() -> Option<PathBuf> {
    std::env::var_os("IBMCLOUD_HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .map(|home| home.join(".bluemix").join("config.json"))
}

/// Reads the token an external CLI login left on disk and asks the CLI to
/// refresh it when it goes stale. The profile file is never written here.
pub struct CliTokenManager {
    apihost: String,
    namespace: Option<String>,
    profile_path: Option<PathBuf>,
    refresh_command: Vec<String>,
    token: Mutex<Option<Token>>,
}

impl CliTokenManager {
    pub fn new(apihost: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            apihost: apihost.into(),
            namespace,
            profile_path: default_profile_path(),
            refresh_command: std::iter::once(CLI_PROGRAM)
                .chain(CLI_REFRESH_ARGS)
                .map(String::from)
                .collect(),
            token: Mutex::new(None),
        }
    }

    pub fn with_profile_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_path = Some(path.into());
        self
    }

    /// Program followed by its arguments
    pub fn with_refresh_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refresh_command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn apihost(&self) -> &str {
        &self.apihost
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn profile_path(&self) -> Option<&Path> {
        self.profile_path.as_deref()
    }

    /// Get a valid bearer token from the CLI profile, refreshing through the CLI if needed
    pub async fn get_token(&self) -> Result<Token> {
        let mut cached = self.token.lock().await;

        if let Some(ref token) = *cached {
            if !is_expired(token) {
                return Ok(token.clone());
            }
        }

        if let Some(token) = self.read_profile_token().await {
            if !is_expired(&token) {
                *cached = Some(token.clone());
                return Ok(token);
            }
            tracing::info!(apihost = %self.apihost, "CLI profile token expired, refreshing via CLI...");
        } else {
            tracing::info!(apihost = %self.apihost, "No CLI profile token found, refreshing via CLI...");
        }

        let printed = match self.run_refresh().await {
            Ok(printed) => printed,
            Err(e) => {
                tracing::error!("CLI token refresh failed: {:#}", e);
                return Err(ProviderError::StaleCredential(format!(
                    "Unable to refresh IAM token for {}: {}",
                    self.apihost, e
                )));
            }
        };

        // The CLI rewrites its profile on refresh; what it prints may lag behind
        let refreshed = match printed {
            Some(token) if !is_expired(&token) => Some(token),
            _ => self.read_profile_token().await,
        };

        match refreshed {
            Some(token) if !is_expired(&token) => {
                tracing::info!(apihost = %self.apihost, "CLI token refreshed");
                *cached = Some(token.clone());
                Ok(token)
            }
            _ => Err(ProviderError::StaleCredential(format!(
                "IAM token for {} is missing or expired",
                self.apihost
            ))),
        }
    }

    /// Read the cached token; unreadable profiles count as absent
    async fn read_profile_token(&self) -> Option<Token> {
        let path = self.profile_path.as_deref()?;
        match load_profile_token(path).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Ignoring CLI profile {}: {:#}", path.display(), e);
                None
            }
        }
    }

    /// Invoke the CLI refresh flow. Returns the token printed on stdout, if any.
    async fn run_refresh(&self) -> AnyResult<Option<Token>> {
        let (program, args) = self
            .refresh_command
            .split_first()
            .context("No CLI refresh command configured")?;

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to run `{}`", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("`{}` exited with {}: {}", program, output.status, stderr.trim());
        }

        let parsed = serde_json::from_slice::<CliOAuthTokens>(&output.stdout)
            .ok()
            .and_then(|tokens| tokens.iam_token)
            .map(|raw| bearer_token(&raw));

        Ok(parsed)
    }
}

impl std::fmt::Debug for CliTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliTokenManager")
            .field("apihost", &self.apihost)
            .field("namespace", &self.namespace)
            .field("profile_path", &self.profile_path)
            .finish()
    }
}

/// Load `IAMToken` from a CLI profile. `Ok(None)` when the file or field is absent.
async fn load_profile_token(path: &Path) -> AnyResult<Option<Token>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read CLI profile: {}", path.display()))
        }
    };
    let profile: CliProfile =
        serde_json::from_str(&contents).context("Failed to parse CLI profile")?;

    Ok(profile
        .iam_token
        .filter(|t| !t.trim().is_empty())
        .map(|raw| bearer_token(&raw)))
}

/// Strip the `Bearer ` prefix and read the expiry from the JWT
fn bearer_token(raw: &str) -> Token {
    let value = raw.trim();
    let value = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .to_string();
    let expires_at = jwt_expiry(&value);
    Token::new(value, expires_at)
}

/// Decode the `exp` claim without verifying the signature
fn jwt_expiry(jwt: &str) -> Option<DateTime<Utc>> {
    let data = jsonwebtoken::dangerous::insecure_decode::<JwtClaims>(jwt).ok()?;
    DateTime::<Utc>::from_timestamp(data.claims.exp?, 0)
}
