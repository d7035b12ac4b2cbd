// Credential merging and validation

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ProviderConfig;
use crate::credentials::PropsLayer;
use crate::error::{ProviderError, Result};

pub const AUTH_KEY: &str = "OW_AUTH";
pub const APIHOST_KEY: &str = "OW_APIHOST";
pub const NAMESPACE_KEY: &str = "OW_NAMESPACE";

// IBM Cloud Functions hosts, where the CLI login profile can supply a token
static MANAGED_CLOUD_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://)?(?:[a-z0-9-]+\.)*(?:cloud\.ibm\.com|bluemix\.net)(?::\d+)?(?:/.*)?$")
        .unwrap()
});

/// Normalized credentials after merging every layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialRecord {
    pub apihost: Option<String>,
    /// `key:secret`
    pub auth: Option<String>,
    pub namespace: Option<String>,
    pub iam_namespace_api_key: Option<String>,
    pub apigw_access_token: Option<String>,
}

impl CredentialRecord {
    pub fn is_iam(&self) -> bool {
        self.iam_namespace_api_key.is_some()
    }

    pub fn is_managed_cloud_host(&self) -> bool {
        self.apihost.as_deref().is_some_and(is_managed_cloud_host)
    }
}

/// Whether the host belongs to the managed cloud offering
pub fn is_managed_cloud_host(apihost: &str) -> bool {
    MANAGED_CLOUD_HOST.is_match(&apihost.to_lowercase())
}

/// Merge the explicit provider config over the given layers.
///
/// Each field is taken from the first layer that sets it to a non-blank value,
/// so a record can mix sources (e.g. host from the environment, auth from `.wskprops`).
pub fn resolve(explicit: &ProviderConfig, layers: &[PropsLayer]) -> CredentialRecord {
    let explicit = explicit.credentials_layer();
    let all: Vec<&PropsLayer> = std::iter::once(&explicit).chain(layers).collect();

    let first = |field: fn(&PropsLayer) -> &Option<String>| {
        all.iter().find_map(|layer| {
            field(layer)
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(String::from)
        })
    };

    let record = CredentialRecord {
        apihost: first(|l| &l.apihost),
        auth: first(|l| &l.auth),
        namespace: first(|l| &l.namespace),
        iam_namespace_api_key: first(|l| &l.iam_namespace_api_key),
        apigw_access_token: first(|l| &l.apigw_access_token),
    };

    tracing::debug!(
        apihost = ?record.apihost,
        namespace = ?record.namespace,
        has_auth = record.auth.is_some(),
        iam = record.is_iam(),
        "Resolved credentials"
    );

    record
}

/// Check that the record is usable. Pure: no I/O, fails on the first missing key.
pub fn has_valid_creds(record: &CredentialRecord) -> Result<()> {
    if record.auth.is_none() && !record.is_iam() && !record.is_managed_cloud_host() {
        return Err(ProviderError::MissingAuth { key: AUTH_KEY });
    }

    if record.apihost.is_none() {
        return Err(ProviderError::MissingHost { key: APIHOST_KEY });
    }

    if record.is_iam() && record.namespace.is_none() {
        return Err(ProviderError::MissingNamespace { key: NAMESPACE_KEY });
    }

    Ok(())
}
