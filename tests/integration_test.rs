// Integration tests for the OpenWhisk provider
//
// These tests run the full path: credential layers -> validation -> client
// construction -> authenticated requests against a mock control plane and
// a mock IAM endpoint.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use openwhisk_provider::{
    auth::AuthHandler,
    config::ProviderConfig,
    credentials::WskPropsSource,
    http_client::ClientFactory,
    Provider, ProviderError,
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

/// Environment snapshot with HOME pointed at an empty directory
fn env_with(home: &tempfile::TempDir, pairs: &[(&str, &str)]) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vars.insert("HOME".to_string(), home.path().to_string_lossy().to_string());
    vars
}

fn provider(config: ProviderConfig, vars: HashMap<String, String>) -> Provider {
    Provider::with_source(config, WskPropsSource::with_vars(vars))
}

async fn mount_actions(server: &MockServer, namespace: &str, auth: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/namespaces/{}/actions", namespace)))
        .and(header("Authorization", auth))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "hello", "namespace": namespace },
            { "name": "goodbye", "namespace": namespace }
        ])))
        .mount(server)
        .await;
}

// ==================================================================================================
// Static key
// ==================================================================================================

#[tokio::test]
async fn test_static_key_lists_actions() {
    let server = MockServer::start().await;
    mount_actions(&server, "_", "Basic dXNlcjpwYXNz").await;

    let home = tempfile::tempdir().unwrap();
    let provider = provider(
        ProviderConfig::default(),
        env_with(&home, &[("OW_APIHOST", server.uri().as_str()), ("OW_AUTH", "user:pass")]),
    );

    let client = provider.client().await.unwrap();
    let actions = client.actions.list().await.unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0]["name"], "hello");
}

#[tokio::test]
async fn test_control_plane_error_surfaces_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/_/actions/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("The requested resource does not exist."))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let provider = provider(
        ProviderConfig::default(),
        env_with(&home, &[("OW_APIHOST", server.uri().as_str()), ("OW_AUTH", "user:pass")]),
    );

    let client = provider.client().await.unwrap();
    match client.actions.get("missing").await {
        Err(ProviderError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert!(message.contains("does not exist"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

// ==================================================================================================
// Layering
// ==================================================================================================

#[tokio::test]
async fn test_profile_file_fills_missing_fields() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(
        home.path().join(".wskprops"),
        "APIHOST=file-host\nAUTH=file:auth\nNAMESPACE=file-ns\n",
    )
    .unwrap();

    let config = ProviderConfig {
        namespace: Some("explicit-ns".to_string()),
        ..Default::default()
    };
    let provider = provider(config, env_with(&home, &[("OW_APIHOST", "env-host")]));

    let props = provider.props().await.unwrap();
    assert_eq!(props.apihost.as_deref(), Some("env-host"));
    assert_eq!(props.auth.as_deref(), Some("file:auth"));
    assert_eq!(props.namespace.as_deref(), Some("explicit-ns"));

    let client = provider.client().await.unwrap();
    assert_eq!(client.options().api.as_str(), "https://env-host/api/v1/");
    assert_eq!(client.options().api_key.as_deref(), Some("file:auth"));
}

#[tokio::test]
async fn test_empty_explicit_auth_uses_environment() {
    let home = tempfile::tempdir().unwrap();
    let config = ProviderConfig {
        auth: Some(String::new()),
        ..Default::default()
    };
    let provider = provider(
        config,
        env_with(&home, &[("OW_APIHOST", "h"), ("OW_AUTH", "user:pass")]),
    );

    let client = provider.client().await.unwrap();
    assert_eq!(client.options().api_key.as_deref(), Some("user:pass"));
}

#[tokio::test]
async fn test_missing_host_is_reported() {
    let home = tempfile::tempdir().unwrap();
    let provider = provider(
        ProviderConfig::default(),
        env_with(&home, &[("OW_AUTH", "user:pass")]),
    );

    let err = provider.client().await.unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("OW_APIHOST"));
}

#[tokio::test]
async fn test_unreadable_explicit_profile_is_config_error() {
    let home = tempfile::tempdir().unwrap();
    let missing = home.path().join("nope");
    let provider = provider(
        ProviderConfig::default(),
        env_with(&home, &[("WSK_CONFIG_FILE", missing.to_str().unwrap())]),
    );

    assert!(matches!(
        provider.props().await,
        Err(ProviderError::Config(_))
    ));
}

// ==================================================================================================
// IAM
// ==================================================================================================

#[tokio::test]
async fn test_iam_key_is_exchanged_once() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "iam-bearer",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&iam)
        .await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/N/actions"))
        .and(header("Authorization", "Bearer iam-bearer"))
        .and(header("X-Namespace-Id", "N"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let provider = provider(
        ProviderConfig::default(),
        env_with(
            &home,
            &[
                ("OW_APIHOST", server.uri().as_str()),
                ("OW_NAMESPACE", "N"),
                ("OW_IAM_NAMESPACE_API_KEY", "K"),
            ],
        ),
    )
    .with_factory(ClientFactory::with_iam_endpoint(format!(
        "{}/identity/token",
        iam.uri()
    )));

    let client = provider.client().await.unwrap();
    assert!(matches!(
        client.options().auth_handler,
        Some(AuthHandler::Iam(_))
    ));

    client.actions.list().await.unwrap();
    client.actions.list().await.unwrap();
}

#[tokio::test]
async fn test_iam_rejection_is_auth_exchange_error() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&iam)
        .await;

    let home = tempfile::tempdir().unwrap();
    let provider = provider(
        ProviderConfig::default(),
        env_with(
            &home,
            &[
                ("OW_APIHOST", "h"),
                ("OW_NAMESPACE", "N"),
                ("OW_IAM_NAMESPACE_API_KEY", "K"),
            ],
        ),
    )
    .with_factory(ClientFactory::with_iam_endpoint(iam.uri()));

    // Building the client performs no exchange
    let client = provider.client().await.unwrap();

    let err = client.options().authorization().await.unwrap_err();
    assert!(matches!(err, ProviderError::AuthExchange(_)));

    // The client stays cached; the token failure does not invalidate it
    let again = provider.client().await.unwrap();
    assert!(Arc::ptr_eq(&client, &again));
}
