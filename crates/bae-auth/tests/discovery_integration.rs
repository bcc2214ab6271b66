//! Discovery against a wiremock identity provider

mod common;

use std::time::Duration;

use bae_auth::discovery::{DiscoveryError, DiscoveryFetcher, FetcherConfig};
use common::MockIdentityProvider;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_explicit_well_known_uri() {
    // GIVEN: a provider serving its OIDC discovery document
    let idp = MockIdentityProvider::start().await;
    idp.mock_discovery().await;
    let fetcher = DiscoveryFetcher::new().unwrap();

    // WHEN: discovering with the explicit well-known URI
    let document = fetcher.fetch(&idp.discovery_uri()).await.unwrap();

    // THEN: endpoints come from the document
    assert_eq!(document.authorization_endpoint, format!("{}/authorize", idp.uri()));
    assert_eq!(document.token_endpoint, idp.token_endpoint());
    assert_eq!(
        document.userinfo_endpoint.as_deref(),
        Some(format!("{}/userinfo", idp.uri()).as_str())
    );
    assert!(document.supports_pkce_s256());
}

#[tokio::test]
async fn test_server_url_resolves_to_oidc_location() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_discovery().await;
    let fetcher = DiscoveryFetcher::new().unwrap();

    let document = fetcher.fetch(&idp.uri()).await.unwrap();

    assert_eq!(document.issuer.as_deref(), Some(idp.uri().as_str()));
}

#[tokio::test]
async fn test_rfc8414_fallback() {
    // GIVEN: only the RFC 8414 location is served
    let idp = MockIdentityProvider::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-authorization-server"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": idp.uri(),
            "authorization_endpoint": format!("{}/authorize", idp.uri()),
            "token_endpoint": format!("{}/token", idp.uri()),
        })))
        .mount(&idp.server)
        .await;
    let fetcher = DiscoveryFetcher::new().unwrap();

    // WHEN / THEN: the OIDC miss falls through to RFC 8414
    let document = fetcher.fetch(&idp.uri()).await.unwrap();
    assert_eq!(document.token_endpoint, idp.token_endpoint());
}

#[tokio::test]
async fn test_all_locations_failing() {
    let idp = MockIdentityProvider::start().await;
    let fetcher = DiscoveryFetcher::new().unwrap();

    let err = fetcher.fetch(&idp.uri()).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::AllEndpointsFailed { .. }));
}

#[tokio::test]
async fn test_explicit_uri_status_error() {
    let idp = MockIdentityProvider::start().await;
    let fetcher = DiscoveryFetcher::new().unwrap();

    let err = fetcher.fetch(&idp.discovery_uri()).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_missing_token_endpoint() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_discovery_with(json!({
        "issuer": idp.uri(),
        "authorization_endpoint": format!("{}/authorize", idp.uri()),
    }))
    .await;
    let fetcher = DiscoveryFetcher::new().unwrap();

    let err = fetcher.fetch(&idp.discovery_uri()).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::MissingField(field) if field == "token_endpoint"));
}

#[tokio::test]
async fn test_malformed_json() {
    let idp = MockIdentityProvider::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&idp.server)
        .await;
    let fetcher = DiscoveryFetcher::new().unwrap();

    let err = fetcher.fetch(&idp.discovery_uri()).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::InvalidJson(_)));
}

#[tokio::test]
async fn test_oversized_document_rejected() {
    // GIVEN: a document padded past a 1 KiB limit
    let idp = MockIdentityProvider::start().await;
    let mut document = idp.discovery_document();
    document["padding"] = json!("x".repeat(4096));
    idp.mock_discovery_with(document).await;
    let fetcher = DiscoveryFetcher::with_config(FetcherConfig {
        max_response_size: 1024,
        ..FetcherConfig::default()
    })
    .unwrap();

    let err = fetcher.fetch(&idp.discovery_uri()).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::ResponseTooLarge { limit: 1024 }));
}

#[tokio::test]
async fn test_timeout() {
    let idp = MockIdentityProvider::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(idp.discovery_document())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&idp.server)
        .await;
    let fetcher = DiscoveryFetcher::with_config(FetcherConfig {
        request_timeout: Duration::from_millis(200),
        ..FetcherConfig::default()
    })
    .unwrap();

    let err = fetcher.fetch(&idp.discovery_uri()).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::Timeout { .. }));
}

#[tokio::test]
async fn test_documents_are_cached_until_invalidated() {
    // GIVEN: a discovery endpoint that must be hit exactly twice
    let idp = MockIdentityProvider::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(idp.discovery_document()))
        .expect(2)
        .mount(&idp.server)
        .await;
    let fetcher = DiscoveryFetcher::new().unwrap();
    let uri = idp.discovery_uri();

    // WHEN: fetching twice, invalidating, then fetching again
    fetcher.fetch(&uri).await.unwrap();
    fetcher.fetch(&uri).await.unwrap();
    assert_eq!(fetcher.cache_stats().valid_entries, 1);
    fetcher.invalidate(&uri);
    fetcher.fetch(&uri).await.unwrap();

    // THEN: the mock expectation (2 calls) is verified on drop
    fetcher.clear_cache();
    assert_eq!(fetcher.cache_stats().total_entries, 0);
}

#[tokio::test]
async fn test_no_store_is_not_cached() {
    let idp = MockIdentityProvider::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("cache-control", "no-store")
                .set_body_json(idp.discovery_document()),
        )
        .expect(2)
        .mount(&idp.server)
        .await;
    let fetcher = DiscoveryFetcher::new().unwrap();

    fetcher.fetch(&idp.discovery_uri()).await.unwrap();
    fetcher.fetch(&idp.discovery_uri()).await.unwrap();

    assert_eq!(fetcher.cache_stats().total_entries, 0);
}

#[tokio::test]
async fn test_redirects_are_not_followed() {
    let idp = MockIdentityProvider::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "http://attacker.invalid/"),
        )
        .mount(&idp.server)
        .await;
    let fetcher = DiscoveryFetcher::new().unwrap();

    let err = fetcher.fetch(&idp.discovery_uri()).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::Status { status: 302, .. }));
}
