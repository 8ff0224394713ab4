// SPDX-License-Identifier: MIT OR Apache-2.0
//! Token provider behaviour against a mock token endpoint.

use std::sync::Arc;
use strata_auth::{Credentials, TokenProvider, TokenProviderSettings};
use strata_error::ErrorKind;
use strata_http::{Network, ReqwestNetwork, ReqwestNetworkConfig};
use strata_task::CancellationContext;
use wiremock::matchers::{body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn network() -> Arc<dyn Network> {
    Arc::new(ReqwestNetwork::new(ReqwestNetworkConfig::default()).unwrap())
}

fn provider(server: &MockServer, minimum_validity_seconds: i64) -> TokenProvider {
    let mut settings = TokenProviderSettings::new(
        Credentials::new("access-key", "access-secret"),
        format!("{}/oauth2/token", server.uri()),
    );
    settings.minimum_validity_seconds = minimum_validity_seconds;
    TokenProvider::new(network(), settings)
}

fn token_response(token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "accessToken": token,
        "tokenType": "bearer",
        "expiresIn": expires_in,
    }))
}

#[tokio::test]
async fn acquires_and_caches_a_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header_exists("Authorization"))
        .and(body_string_contains("client_credentials"))
        .respond_with(token_response("tok-1", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server, 300);
    let ctx = CancellationContext::new();
    let first = provider.token(&ctx).await.unwrap();
    assert_eq!(first.access_token, "tok-1");
    assert!(first.expires_in() > 3500);

    // Second call is served from the cache; the mock expects exactly one hit.
    let second = provider.token(&ctx).await.unwrap();
    assert_eq!(second.access_token, "tok-1");
    assert_eq!(provider.http_status_code(), Some(200));
    assert!(provider.error_response().is_none());
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_response("tok-shared", 3600).set_delay(std::time::Duration::from_millis(50)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(provider(&server, 300));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let provider = provider.clone();
        handles.push(tokio::spawn(async move {
            provider.token(&CancellationContext::new()).await
        }));
    }
    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.access_token, "tok-shared");
    }
}

#[tokio::test]
async fn zero_validity_forces_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("tok", 3600))
        .expect(2)
        .mount(&server)
        .await;

    let provider = provider(&server, 0);
    let ctx = CancellationContext::new();
    provider.token(&ctx).await.unwrap();
    provider.token(&ctx).await.unwrap();
}

#[tokio::test]
async fn short_lived_token_is_refreshed() {
    let server = MockServer::start().await;
    // Lifetime below the validity window, so every call refreshes.
    Mock::given(method("POST"))
        .respond_with(token_response("tok", 60))
        .expect(2)
        .mount(&server)
        .await;

    let provider = provider(&server, 300);
    let ctx = CancellationContext::new();
    provider.token(&ctx).await.unwrap();
    provider.token(&ctx).await.unwrap();
}

#[tokio::test]
async fn forbidden_clears_cached_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("tok", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server, 300);
    let ctx = CancellationContext::new();
    provider.token(&ctx).await.unwrap();

    server.reset().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;

    provider.invalidate();
    let err = provider.token(&ctx).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
    assert_eq!(provider.http_status_code(), Some(403));
    assert_eq!(provider.error_response().unwrap().kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn server_failure_surfaces_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider = provider(&server, 300);
    let err = provider
        .token(&CancellationContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    assert_eq!(provider.http_status_code(), Some(503));
}

#[tokio::test]
async fn transport_failure_keeps_cached_token() {
    let server = MockServer::start().await;
    // Token shorter than the validity window: the second call must try a
    // refresh while a cached token still exists.
    Mock::given(method("POST"))
        .respond_with(token_response("tok-cached", 120))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server, 300);
    let ctx = CancellationContext::new();
    provider.token(&ctx).await.unwrap();

    server.reset().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    // The refresh attempt fails, but the cached (still unexpired) token is
    // not cleared by a 5xx.
    let err = provider.token(&ctx).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    assert!(provider.error_response().is_some());
}

#[tokio::test]
async fn unparseable_body_is_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = provider(&server, 300);
    let err = provider
        .token(&CancellationContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn cancelled_context_short_circuits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("tok", 3600))
        .expect(0)
        .mount(&server)
        .await;

    let provider = provider(&server, 300);
    let ctx = CancellationContext::new();
    ctx.cancel_operation();
    let err = provider.token(&ctx).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
}
