use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::credentials::PropsLayer;
use crate::error::{ProviderError, Result};
use crate::http_client::{ProviderFlags, TlsIdentity};

/// OpenWhisk provider - credential resolution and client checks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Control-plane API host (overrides OW_APIHOST / .wskprops)
    #[arg(long)]
    pub apihost: Option<String>,

    /// Static `key:secret` credential (overrides OW_AUTH / .wskprops)
    #[arg(long)]
    pub auth: Option<String>,

    /// Namespace (overrides OW_NAMESPACE / .wskprops)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// IAM namespace API key
    #[arg(long)]
    pub iam_api_key: Option<String>,

    /// API gateway access token
    #[arg(long)]
    pub apigw_access_token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, default_value = "false")]
    pub ignore_certs: bool,

    /// Client certificate (PEM) for mutual TLS
    #[arg(long, requires = "key")]
    pub cert: Option<String>,

    /// Client private key (PEM) for mutual TLS
    #[arg(long, requires = "cert")]
    pub key: Option<String>,

    /// Profile file to read instead of WSK_CONFIG_FILE / ~/.wskprops
    #[arg(long)]
    pub wskprops: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Resolve and validate credentials
    Check,
    /// Fetch a token through the selected auth strategy
    Token,
    /// List actions in the resolved namespace
    Actions,
}

/// Explicit provider configuration, the highest-precedence credential layer
#[derive(Clone, Debug, Default)]
pub struct ProviderConfig {
    pub apihost: Option<String>,
    pub auth: Option<String>,
    pub namespace: Option<String>,
    pub iam_namespace_api_key: Option<String>,
    pub apigw_access_token: Option<String>,

    pub ignore_certs: bool,
    pub tls: Option<TlsIdentity>,

    /// Overrides the profile file location
    pub wskprops: Option<PathBuf>,
}

impl ProviderConfig {
    /// Build the provider section from parsed CLI arguments, reading TLS material from disk
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let tls = match (&args.cert, &args.key) {
            (Some(cert), Some(key)) => Some(load_tls_identity(
                &expand_tilde(cert),
                &expand_tilde(key),
            )?),
            (None, None) => None,
            _ => {
                return Err(ProviderError::Config(
                    "--cert and --key must be given together".to_string(),
                ))
            }
        };

        Ok(Self {
            apihost: non_empty(&args.apihost),
            auth: non_empty(&args.auth),
            namespace: non_empty(&args.namespace),
            iam_namespace_api_key: non_empty(&args.iam_api_key),
            apigw_access_token: non_empty(&args.apigw_access_token),
            ignore_certs: args.ignore_certs,
            tls,
            wskprops: args.wskprops.as_deref().map(expand_tilde),
        })
    }

    /// Credential fields as a resolution layer
    pub fn credentials_layer(&self) -> PropsLayer {
        PropsLayer {
            apihost: self.apihost.clone(),
            auth: self.auth.clone(),
            namespace: self.namespace.clone(),
            apigw_access_token: self.apigw_access_token.clone(),
            iam_namespace_api_key: self.iam_namespace_api_key.clone(),
        }
    }

    /// Client construction flags
    pub fn flags(&self) -> ProviderFlags {
        ProviderFlags {
            ignore_certs: self.ignore_certs,
            tls: self.tls.clone(),
        }
    }
}

/// Parse CLI arguments, honoring a local .env file
pub fn load_args() -> CliArgs {
    dotenvy::dotenv().ok();
    CliArgs::parse()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

fn load_tls_identity(cert: &Path, key: &Path) -> Result<TlsIdentity> {
    let read = |path: &Path, what: &str| {
        std::fs::read(path).map_err(|e| {
            ProviderError::Config(format!("Failed to read {}: {}: {}", what, path.display(), e))
        })
    };
    let cert_pem = read(cert, "client certificate")?;
    let key_pem = read(key, "client key")?;
    Ok(TlsIdentity { cert_pem, key_pem })
}

/// Expand tilde (~) in file paths to user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
