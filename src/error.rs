// Error handling module
// Defines the provider error taxonomy

use thiserror::Error;

/// Errors raised while resolving credentials or building the control-plane client
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Malformed or unreadable configuration layer
    #[error("Configuration error: {0}")]
    Config(String),

    /// No auth key and no IAM key could be resolved
    #[error(
        "Missing mandatory openwhisk configuration property: {key}. \
         Check .wskprops file or set {key} environment variable."
    )]
    MissingAuth { key: &'static str },

    /// No API host could be resolved
    #[error(
        "Missing mandatory openwhisk configuration property: {key}. \
         Check .wskprops file or set {key} environment variable."
    )]
    MissingHost { key: &'static str },

    /// IAM credentials were supplied without a namespace
    #[error(
        "Missing mandatory openwhisk configuration property: {key}. \
         IAM namespace API keys require a namespace."
    )]
    MissingNamespace { key: &'static str },

    /// IAM token exchange failed (network or rejected key)
    #[error("IAM token exchange failed: {0}")]
    AuthExchange(String),

    /// CLI profile token cannot be recovered without a fresh login
    #[error("{0}. Run `ibmcloud login` to re-authenticate.")]
    StaleCredential(String),

    /// Error response from the control plane
    #[error("OpenWhisk API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ProviderError {
    /// Validation errors are fatal and user-facing: they name the key to set
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProviderError::MissingAuth { .. }
                | ProviderError::MissingHost { .. }
                | ProviderError::MissingNamespace { .. }
        )
    }
}

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_messages_name_the_variable() {
        let err = ProviderError::MissingAuth { key: "OW_AUTH" };
        assert!(err.to_string().contains("OW_AUTH"));

        let err = ProviderError::MissingHost { key: "OW_APIHOST" };
        assert!(err.to_string().contains("OW_APIHOST"));

        let err = ProviderError::MissingNamespace { key: "OW_NAMESPACE" };
        assert!(err.to_string().contains("OW_NAMESPACE"));
    }

    #[test]
    fn test_error_messages() {
        let err = ProviderError::Config("bad .wskprops".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad .wskprops");

        let err = ProviderError::Api {
            status: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "OpenWhisk API error: 404 - not found");

        let err = ProviderError::StaleCredential("IAM token expired".to_string());
        assert_eq!(
            err.to_string(),
            "IAM token expired. Run `ibmcloud login` to re-authenticate."
        );
    }

    #[test]
    fn test_internal_error_message() {
        let err = ProviderError::Internal(anyhow::anyhow!("Something went wrong"));
        assert_eq!(err.to_string(), "Internal error: Something went wrong");
    }

    #[test]
    fn test_is_validation() {
        assert!(ProviderError::MissingAuth { key: "OW_AUTH" }.is_validation());
        assert!(ProviderError::MissingHost { key: "OW_APIHOST" }.is_validation());
        assert!(!ProviderError::AuthExchange("401".to_string()).is_validation());
        assert!(!ProviderError::Config("x".to_string()).is_validation());
    }
}
