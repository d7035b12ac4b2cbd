use reqwest::{Method, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::auth::{
    redact, AuthHandler, CliTokenManager, IamTokenManager, StaticAuthHandler, DEFAULT_IAM_ENDPOINT,
};
use crate::error::{ProviderError, Result};
use crate::resolver::{CredentialRecord, APIHOST_KEY, AUTH_KEY, NAMESPACE_KEY};

/// The control plane API version; not configurable
pub const API_VERSION: &str = "v1";

/// Namespace placeholder the control plane resolves to the caller's default namespace
const DEFAULT_NAMESPACE: &str = "_";

/// Client certificate and key (PEM) for mutual TLS
#[derive(Clone)]
pub struct TlsIdentity {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

impl TlsIdentity {
    fn to_identity(&self) -> Result<reqwest::Identity> {
        let mut pem = self.key_pem.clone();
        pem.push(b'\n');
        pem.extend_from_slice(&self.cert_pem);
        reqwest::Identity::from_pem(&pem)
            .map_err(|e| ProviderError::Config(format!("Invalid client certificate or key: {}", e)))
    }
}

impl std::fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("cert_pem", &format!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

/// Provider flags that shape the client but are not credentials
#[derive(Debug, Clone, Default)]
pub struct ProviderFlags {
    pub ignore_certs: bool,
    pub tls: Option<TlsIdentity>,
}

/// Which auth handler a credential record calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// `auth` is sent as-is; no handler object
    Static,
    Iam,
    Cli,
}

/// Pick the auth strategy for a record
pub fn select_strategy(record: &CredentialRecord) -> Result<AuthStrategy> {
    if record.is_iam() {
        Ok(AuthStrategy::Iam)
    } else if record.auth.is_none() && record.is_managed_cloud_host() {
        Ok(AuthStrategy::Cli)
    } else if record.auth.is_some() {
        Ok(AuthStrategy::Static)
    } else {
        Err(ProviderError::MissingAuth { key: AUTH_KEY })
    }
}

/// Fully derived client configuration
pub struct ClientOptions {
    pub api: Url,
    pub api_key: Option<String>,
    pub namespace: Option<String>,
    pub ignore_certs: bool,
    pub api_version: &'static str,
    pub tls: Option<TlsIdentity>,
    pub auth_handler: Option<AuthHandler>,
    pub apigw_token: Option<String>,
    pub apigw_space_guid: Option<String>,
}

impl ClientOptions {
    /// Value for the `Authorization` header
    pub async fn authorization(&self) -> Result<String> {
        match (&self.auth_handler, &self.api_key) {
            (Some(handler), _) => handler.authorization().await,
            (None, Some(key)) => {
                AuthHandler::Static(StaticAuthHandler::new(key.clone()))
                    .authorization()
                    .await
            }
            (None, None) => Err(ProviderError::MissingAuth { key: AUTH_KEY }),
        }
    }

    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("api", &self.api.as_str())
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("namespace", &self.namespace)
            .field("ignore_certs", &self.ignore_certs)
            .field("api_version", &self.api_version)
            .field("tls", &self.tls)
            .field("auth_handler", &self.auth_handler)
            .field("apigw_token", &self.apigw_token.as_deref().map(redact))
            .field("apigw_space_guid", &self.apigw_space_guid)
            .finish()
    }
}

/// Build the API base URL; a host that already carries a scheme keeps it
pub fn api_url(apihost: &str) -> Result<Url> {
    let host = apihost.trim().trim_end_matches('/');
    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };

    Url::parse(&format!("{}/api/{}/", base, API_VERSION))
        .map_err(|e| ProviderError::Config(format!("Invalid API host '{}': {}", apihost, e)))
}

/// Builds configured control-plane clients from resolved credentials
#[derive(Debug, Clone)]
pub struct ClientFactory {
    iam_endpoint: String,
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self {
            iam_endpoint: DEFAULT_IAM_ENDPOINT.to_string(),
        }
    }
}

impl ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different IAM token endpoint for IAM credentials
    pub fn with_iam_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            iam_endpoint: endpoint.into(),
        }
    }

    /// Derive client options from a record. No network calls happen here;
    /// token managers fetch lazily on first use.
    pub fn options(&self, record: &CredentialRecord, flags: &ProviderFlags) -> Result<ClientOptions> {
        let apihost = record
            .apihost
            .as_deref()
            .ok_or(ProviderError::MissingHost { key: APIHOST_KEY })?;
        let api = api_url(apihost)?;
        let strategy = select_strategy(record)?;

        let (api_key, auth_handler) = match strategy {
            AuthStrategy::Iam => {
                let api_key = record.iam_namespace_api_key.clone().unwrap_or_default();
                let namespace = record
                    .namespace
                    .clone()
                    .ok_or(ProviderError::MissingNamespace { key: NAMESPACE_KEY })?;
                let manager =
                    IamTokenManager::with_endpoint(api_key, namespace, self.iam_endpoint.clone())?;
                (None, Some(AuthHandler::Iam(manager)))
            }
            AuthStrategy::Cli => {
                let manager = CliTokenManager::new(apihost, record.namespace.clone());
                (None, Some(AuthHandler::Cli(manager)))
            }
            AuthStrategy::Static => (record.auth.clone(), None),
        };

        // Space guid: the IAM namespace, or the key half of a static `key:secret`
        let apigw_space_guid = match (&record.apigw_access_token, strategy) {
            (None, _) => None,
            (Some(_), AuthStrategy::Iam) => record.namespace.clone(),
            (Some(_), _) => record
                .auth
                .as_deref()
                .and_then(|auth| auth.split(':').next())
                .map(String::from),
        };

        tracing::debug!(
            api = %api,
            strategy = ?strategy,
            ignore_certs = flags.ignore_certs,
            "Built client options"
        );

        Ok(ClientOptions {
            api,
            api_key,
            namespace: record.namespace.clone(),
            ignore_certs: flags.ignore_certs,
            api_version: API_VERSION,
            tls: flags.tls.clone(),
            auth_handler,
            apigw_token: record.apigw_access_token.clone(),
            apigw_space_guid,
        })
    }

    /// Build a ready-to-use client
    pub fn build(&self, record: &CredentialRecord, flags: &ProviderFlags) -> Result<Client> {
        let options = self.options(record, flags)?;
        Client::new(options)
    }
}

/// Authenticated control-plane client
#[derive(Debug)]
pub struct Client {
    options: Arc<ClientOptions>,
    pub actions: Resource,
    pub triggers: Resource,
    pub rules: Resource,
    pub packages: Resource,
}

impl Client {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(options.ignore_certs);

        if let Some(ref tls) = options.tls {
            builder = builder.identity(tls.to_identity()?);
        }

        let http = builder
            .build()
            .map_err(|e| ProviderError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let options = Arc::new(options);
        let resource = |kind| Resource {
            kind,
            options: options.clone(),
            http: http.clone(),
        };

        Ok(Self {
            actions: resource("actions"),
            triggers: resource("triggers"),
            rules: resource("rules"),
            packages: resource("packages"),
            options,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

/// One collection under `namespaces/{namespace}/`
#[derive(Debug, Clone)]
pub struct Resource {
    kind: &'static str,
    options: Arc<ClientOptions>,
    http: reqwest::Client,
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// `{api}namespaces/{namespace}/{kind}[/{name}]`
    pub fn url(&self, name: Option<&str>) -> Result<Url> {
        let mut url = self.options.api.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Config(format!("Invalid API URL: {}", self.options.api)))?
            .pop_if_empty()
            .extend(["namespaces", self.options.namespace_or_default(), self.kind])
            .extend(name);
        Ok(url)
    }

    /// Request builder with authentication headers attached
    pub async fn request(&self, method: Method, name: Option<&str>) -> Result<RequestBuilder> {
        let url = self.url(name)?;
        let authorization = self.options.authorization().await?;

        let mut request = self
            .http
            .request(method, url)
            .header("Authorization", authorization)
            .header("Accept", "application/json");

        if let Some(AuthHandler::Iam(ref manager)) = self.options.auth_handler {
            request = request.header("X-Namespace-Id", manager.namespace());
        }

        Ok(request)
    }

    /// List the collection
    pub async fn list(&self) -> Result<Vec<serde_json::Value>> {
        let response = self.send(Method::GET, None).await?;
        response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(anyhow::anyhow!("Invalid {} listing: {}", self.kind, e)))
    }

    /// Fetch one entity by name
    pub async fn get(&self, name: &str) -> Result<serde_json::Value> {
        let response = self.send(Method::GET, Some(name)).await?;
        response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(anyhow::anyhow!("Invalid {} response: {}", self.kind, e)))
    }

    async fn send(&self, method: Method, name: Option<&str>) -> Result<reqwest::Response> {
        let request = self.request(method, name).await?;
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Internal(anyhow::anyhow!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        tracing::error!(
            status = status.as_u16(),
            kind = self.kind,
            response_body = %message,
            "OpenWhisk request failed"
        );
        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
