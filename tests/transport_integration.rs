//! Integration tests for request execution: authentication, retries,
//! throttling and error classification against a mock web service.

mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use support::socket_guard::start_mock_server_or_skip;
use support::{ValidDigest, client_for, client_with_throttle};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};
use wsgate_core::{ApiError, ApiRequest, ClientConfig, Credentials, RequestThrottle};

const CHALLENGE: &str = r#"Digest realm="musicbrainz.org", nonce="n1", qop="auth", opaque="op1""#;

fn with_user() -> ClientConfig {
    ClientConfig::default().with_credentials(Credentials::new("user", "pass"))
}

fn unauthorized(challenge: &str) -> ResponseTemplate {
    ResponseTemplate::new(401)
        .insert_header("WWW-Authenticate", challenge)
        .set_body_string("Authentication required")
}

#[tokio::test]
async fn test_digest_challenge_retried_once_then_succeeds() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/ws/2/tag"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<metadata/>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ws/2/tag"))
        .respond_with(unauthorized(CHALLENGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, with_user());
    let response = client
        .execute(&ApiRequest::get("tag").query("id", "1"))
        .await
        .expect("digest retry should succeed");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "<metadata/>");
    assert_eq!(
        client.negotiator().cached_digest().expect("cached").nonce(),
        "n1"
    );
}

#[tokio::test]
async fn test_digest_header_contents() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/ws/2/tag"))
        .and(ValidDigest::new("user", "pass"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ws/2/tag"))
        .respond_with(unauthorized(CHALLENGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, with_user());
    client
        .execute(&ApiRequest::get("tag").query("id", "1"))
        .await
        .expect("well-formed digest header should be accepted");
}

#[tokio::test]
async fn test_repeated_401_is_not_retried_a_second_time() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/ws/2/tag"))
        .respond_with(unauthorized(CHALLENGE))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, with_user());
    let error = client
        .execute(&ApiRequest::get("tag"))
        .await
        .expect_err("second 401 must surface");

    let response = error.as_response().expect("classified response");
    assert!(response.is_authentication());
    assert_eq!(response.message.as_deref(), Some("Authentication required"));
}

#[tokio::test]
async fn test_rotating_nonce_still_retries_only_once() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/ws/2/tag"))
        .respond_with(unauthorized(r#"Digest realm="r", nonce="first""#))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ws/2/tag"))
        .respond_with(unauthorized(r#"Digest realm="r", nonce="second""#))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, with_user());
    let error = client.execute(&ApiRequest::get("tag")).await.unwrap_err();
    assert_eq!(error.status(), Some(401));
}

#[tokio::test]
async fn test_negotiated_digest_reused_by_later_calls() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(unauthorized(CHALLENGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, with_user());
    client.execute(&ApiRequest::get("tag")).await.expect("first call");
    client
        .execute(&ApiRequest::get("rating"))
        .await
        .expect("second call sends the cached digest up front");
}

#[tokio::test]
async fn test_clients_do_not_share_digest_state() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(unauthorized(CHALLENGE))
        .mount(&server)
        .await;

    let first = client_for(&server, with_user());
    let second = client_for(&server, with_user());
    first.execute(&ApiRequest::get("tag")).await.expect("negotiates");

    assert!(first.negotiator().cached_digest().is_some());
    assert!(second.negotiator().cached_digest().is_none());
}

#[tokio::test]
async fn test_without_credentials_401_surfaces_immediately() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(unauthorized(CHALLENGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ClientConfig::default());
    let error = client.execute(&ApiRequest::get("tag")).await.unwrap_err();
    assert_eq!(error.status(), Some(401));
}

#[tokio::test]
async fn test_unsupported_digest_algorithm_abandons_negotiation() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(unauthorized(r#"Digest realm="r", nonce="n", algorithm="SHA-256""#))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, with_user());
    let error = client.execute(&ApiRequest::get("tag")).await.unwrap_err();
    assert_eq!(error.status(), Some(401));
    assert!(client.negotiator().cached_digest().is_none());
}

#[tokio::test]
async fn test_bearer_token_sent_and_never_renegotiated() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/ws/2/collection"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ws/2/tag"))
        .respond_with(unauthorized(CHALLENGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, with_user().with_bearer_token("tok-1"));
    client
        .execute(&ApiRequest::get("collection"))
        .await
        .expect("bearer accepted");

    let error = client.execute(&ApiRequest::get("tag")).await.unwrap_err();
    assert_eq!(error.status(), Some(401));
    assert!(client.negotiator().cached_digest().is_none());
}

#[tokio::test]
async fn test_json_error_body_is_classified() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_raw(r#"{"error":"invalid","help":"bad token"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, ClientConfig::default());
    let error = client.execute(&ApiRequest::get("artist")).await.unwrap_err();
    let response = error.as_response().expect("classified");
    assert_eq!(response.status, 400);
    assert_eq!(response.reason, "Bad Request");
    assert_eq!(response.message.as_deref(), Some("invalid (bad token)"));
}

#[tokio::test]
async fn test_rate_limited_response_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "2"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ClientConfig::default());
    let error = client.execute(&ApiRequest::get("artist")).await.unwrap_err();
    let response = error.as_response().expect("classified");
    assert!(response.is_rate_limited());
    assert_eq!(response.retry_after, Some(Duration::from_secs(2)));
    assert_eq!(response.message, None);
}

#[tokio::test]
async fn test_post_body_and_content_type_forwarded() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/ws/2/tag"))
        .and(header("content-type", "application/xml; charset=UTF-8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ClientConfig::default());
    let response = client
        .execute(
            &ApiRequest::new(reqwest::Method::POST, "tag")
                .body("application/xml; charset=UTF-8", "<metadata/>"),
        )
        .await
        .expect("post succeeds");
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let config = ClientConfig::default()
        .with_base_url("http://127.0.0.1:1/ws/2/")
        .with_timeouts(2, 2);
    let client = wsgate_core::ApiClient::with_throttle(config, Arc::new(RequestThrottle::disabled()))
        .expect("client");

    let error = client.execute(&ApiRequest::get("artist")).await.unwrap_err();
    assert!(
        matches!(error, ApiError::Network { .. } | ApiError::Timeout { .. }),
        "unexpected error: {error:?}"
    );
    assert_eq!(error.status(), None);
}

#[tokio::test]
async fn test_auth_retry_passes_through_throttle() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(unauthorized(CHALLENGE))
        .mount(&server)
        .await;

    let throttle = Arc::new(RequestThrottle::new(Duration::from_millis(200)));
    let client = client_with_throttle(&server, with_user(), throttle);

    let start = Instant::now();
    client.execute(&ApiRequest::get("tag")).await.expect("retry succeeds");
    assert!(
        start.elapsed() >= Duration::from_millis(200),
        "retry must wait for the throttle, took {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_concurrent_clients_share_one_throttle() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&server)
        .await;

    let throttle = Arc::new(RequestThrottle::new(Duration::from_millis(100)));
    let a = client_with_throttle(&server, ClientConfig::default(), Arc::clone(&throttle));
    let b = client_with_throttle(&server, ClientConfig::default(), Arc::clone(&throttle));

    let start = Instant::now();
    let request = ApiRequest::get("artist");
    let (r1, r2, r3, r4) = tokio::join!(
        a.execute(&request),
        b.execute(&request),
        a.execute(&request),
        b.execute(&request)
    );
    for result in [r1, r2, r3, r4] {
        result.expect("request succeeds");
    }

    assert!(
        start.elapsed() >= Duration::from_millis(300),
        "four admissions need three intervals, took {:?}",
        start.elapsed()
    );
}
