// Credential layers from the environment and the .wskprops profile file

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ProviderError, Result};

/// Prefix of the environment variables carrying credentials (`OW_APIHOST`, `OW_AUTH`, ...)
pub const ENV_PREFIX: &str = "OW_";

/// Environment variable pointing at a non-default profile file
pub const WSK_CONFIG_FILE_ENV: &str = "WSK_CONFIG_FILE";

const DEFAULT_PROFILE_FILE: &str = ".wskprops";

/// One source of credential fields; every field is optional
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropsLayer {
    pub apihost: Option<String>,
    pub auth: Option<String>,
    pub namespace: Option<String>,
    pub apigw_access_token: Option<String>,
    pub iam_namespace_api_key: Option<String>,
}

impl PropsLayer {
    /// Build a layer from `{prefix}APIHOST`, `{prefix}AUTH`, ... keys. Empty values count as absent.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", prefix, name)).filter(|v| !v.trim().is_empty())
        };

        Self {
            apihost: get("APIHOST"),
            auth: get("AUTH"),
            namespace: get("NAMESPACE"),
            apigw_access_token: get("APIGW_ACCESS_TOKEN"),
            iam_namespace_api_key: get("IAM_NAMESPACE_API_KEY"),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Supplies the non-explicit credential layers, highest precedence first
#[async_trait]
pub trait PropsSource: Send + Sync {
    async fn load(&self) -> Result<Vec<PropsLayer>>;
}

/// Environment variables over the `.wskprops` file
pub struct WskPropsSource {
    vars: HashMap<String, String>,
    config_file: Option<PathBuf>,
}

impl WskPropsSource {
    /// Snapshot the process environment
    pub fn from_env() -> Self {
        Self::with_vars(std::env::vars().collect())
    }

    pub fn with_vars(vars: HashMap<String, String>) -> Self {
        Self {
            vars,
            config_file: None,
        }
    }

    /// Profile file to read instead of `WSK_CONFIG_FILE` / `~/.wskprops`
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    fn env_layer(&self) -> PropsLayer {
        PropsLayer::from_lookup(ENV_PREFIX, |key| self.vars.get(key).cloned())
    }

    /// Resolve the profile path; the flag tells whether it was named explicitly
    fn profile_path(&self) -> Option<(PathBuf, bool)> {
        if let Some(ref path) = self.config_file {
            return Some((path.clone(), true));
        }

        if let Some(path) = self.vars.get(WSK_CONFIG_FILE_ENV).filter(|p| !p.is_empty()) {
            return Some((PathBuf::from(path), true));
        }

        self.vars
            .get("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .map(|home| (home.join(DEFAULT_PROFILE_FILE), false))
    }
}

#[async_trait]
impl PropsSource for WskPropsSource {
    async fn load(&self) -> Result<Vec<PropsLayer>> {
        let env = self.env_layer();
        tracing::debug!(empty = env.is_empty(), "Loaded credential layer from environment");

        let mut layers = vec![env];

        match self.profile_path() {
            Some((path, explicit)) => {
                if explicit || path.exists() {
                    layers.push(read_profile(&path).await?);
                } else {
                    tracing::debug!("No profile file at {}", path.display());
                }
            }
            None => tracing::debug!("No home directory, skipping profile file"),
        }

        Ok(layers)
    }
}

/// Read a `.wskprops` file (dotenv `KEY=VALUE` lines)
pub async fn read_profile(path: &Path) -> Result<PropsLayer> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        ProviderError::Config(format!(
            "Failed to read profile file {}: {}",
            path.display(),
            e
        ))
    })?;

    let props = parse_profile(&contents).map_err(|e| {
        ProviderError::Config(format!(
            "Failed to parse profile file {}: {}",
            path.display(),
            e
        ))
    })?;

    tracing::debug!("Loaded credential layer from {}", path.display());
    Ok(PropsLayer::from_lookup("", |key| props.get(key).cloned()))
}

fn parse_profile(contents: &str) -> std::result::Result<HashMap<String, String>, dotenvy::Error> {
    dotenvy::from_read_iter(contents.as_bytes()).collect()
}
