// IAM API key exchange

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use tokio::sync::Mutex;

use super::manager::{is_expired, redact};
use super::types::{IamErrorResponse, IamTokenResponse, Token};
use crate::error::{ProviderError, Result};

/// Public IAM token endpoint
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.cloud.ibm.com/identity/token";

const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Exchanges an IAM namespace API key for short-lived bearer tokens
pub struct IamTokenManager {
    api_key: String,
    namespace: String,
    endpoint: String,
    client: Client,

    /// Cached token; the lock also serializes exchanges
    token: Mutex<Option<Token>>,
}

impl IamTokenManager {
    /// Create a manager against the public IAM endpoint
    pub fn new(api_key: impl Into<String>, namespace: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(api_key, namespace, DEFAULT_IAM_ENDPOINT)
    }

    /// Create a manager against a specific IAM endpoint
    pub fn with_endpoint(
        api_key: impl Into<String>,
        namespace: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key: api_key.into(),
            namespace: namespace.into(),
            endpoint: endpoint.into(),
            client,
            token: Mutex::new(None),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get a valid bearer token, exchanging the API key if the cache is empty or expired
    pub async fn get_token(&self) -> Result<Token> {
        let mut cached = self.token.lock().await;

        if let Some(ref token) = *cached {
            if !is_expired(token) {
                return Ok(token.clone());
            }
            tracing::debug!(namespace = %self.namespace, "IAM token expired, re-exchanging");
        }

        let token = self.exchange().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Trade the API key for a bearer token
    async fn exchange(&self) -> Result<Token> {
        tracing::info!(
            endpoint = %self.endpoint,
            api_key = %redact(&self.api_key),
            "Exchanging IAM API key for bearer token..."
        );

        let form = [
            ("grant_type", APIKEY_GRANT_TYPE),
            ("apikey", self.api_key.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::AuthExchange(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %error_text, "IAM token exchange failed");

            // IAM returns errorCode / errorMessage on rejected keys
            if let Ok(body) = serde_json::from_str::<IamErrorResponse>(&error_text) {
                if let (Some(code), Some(message)) = (body.error_code, body.error_message) {
                    return Err(ProviderError::AuthExchange(format!(
                        "{} - {}: {}",
                        status, code, message
                    )));
                }
            }

            return Err(ProviderError::AuthExchange(format!(
                "{} - {}",
                status, error_text
            )));
        }

        let data: IamTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::AuthExchange(format!("invalid response: {}", e)))?;

        if data.access_token.is_empty() {
            return Err(ProviderError::AuthExchange(
                "response does not contain access_token".to_string(),
            ));
        }

        let expires_at = data
            .expiration
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(data.expires_in.unwrap_or(3600)));

        tracing::info!("IAM token acquired, expires: {}", expires_at.to_rfc3339());

        Ok(Token::new(data.access_token, Some(expires_at)))
    }
}

impl std::fmt::Debug for IamTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamTokenManager")
            .field("api_key", &redact(&self.api_key))
            .field("namespace", &self.namespace)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
