// Authentication types

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A credential ready to be attached to a request
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: String,
    /// `None` for credentials that never expire
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }
}

/// IAM identity token response
#[derive(Deserialize)]
pub struct IamTokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    /// Absolute expiry as unix seconds
    pub expiration: Option<i64>,
}

/// IAM error body
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamErrorResponse {
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// IBM Cloud CLI profile (`.bluemix/config.json`), only the fields we read
#[derive(Deserialize)]
pub struct CliProfile {
    #[serde(rename = "IAMToken", default)]
    pub iam_token: Option<String>,
}

/// Output of `ibmcloud iam oauth-tokens --output json`
#[derive(Deserialize)]
pub struct CliOAuthTokens {
    pub iam_token: Option<String>,
}

/// JWT claims we care about
#[derive(Deserialize)]
pub struct JwtClaims {
    pub exp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iam_token_response_ignores_unread_fields() {
        let body = r#"{"access_token":"a","refresh_token":"r","token_type":"Bearer","expires_in":3600,"expiration":1700003600}"#;
        let response: IamTokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.access_token, "a");
        assert_eq!(response.expires_in, Some(3600));
        assert_eq!(response.expiration, Some(1700003600));
    }
}
