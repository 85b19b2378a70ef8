//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Value, json};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use wiremock::{Match, MockServer, Request, ResponseTemplate};
use wsgate_core::auth::{DigestCredential, NONCE_COUNT, parse_challenge};
use wsgate_core::{ApiClient, ClientConfig, Credentials, RequestThrottle};

/// Builds a client pointed at the mock server's `/ws/2/` root with throttling disabled.
pub fn client_for(server: &MockServer, config: ClientConfig) -> ApiClient {
    client_with_throttle(server, config, Arc::new(RequestThrottle::disabled()))
}

/// Builds a client pointed at the mock server with the given throttle.
pub fn client_with_throttle(
    server: &MockServer,
    config: ClientConfig,
    throttle: Arc<RequestThrottle>,
) -> ApiClient {
    let config = config.with_base_url(format!("{}/ws/2/", server.uri()));
    ApiClient::with_throttle(config, throttle).expect("client")
}

/// A JSON listing page `{"count": total, "items": [...]}`.
pub fn listing(total: u64, ids: &[&str]) -> ResponseTemplate {
    let items: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
    ResponseTemplate::new(200).set_body_json(json!({ "count": total, "items": items }))
}

/// Extracts the `id` field of a raw record.
pub fn id_of(record: &Value) -> String {
    record["id"].as_str().unwrap_or_default().to_string()
}

/// Matches requests whose digest `Authorization` header is valid for the given secret.
///
/// Recomputes the response hash from the header's own directives and the
/// request line, and checks the counter and request-URI.
pub struct ValidDigest {
    credentials: Credentials,
}

impl ValidDigest {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            credentials: Credentials::new(username, password),
        }
    }
}

impl Match for ValidDigest {
    fn matches(&self, request: &Request) -> bool {
        let Some(value) = request
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
        else {
            return false;
        };
        // The header shares the challenge's key="value" grammar.
        let Some(directives) = parse_challenge(value) else {
            return false;
        };
        let Some(digest) = DigestCredential::from_challenge(&directives) else {
            return false;
        };

        let uri = directives.get("uri").unwrap_or_default();
        let expected_uri = match request.url.query() {
            Some(query) => format!("{}?{query}", request.url.path()),
            None => request.url.path().to_string(),
        };
        let cnonce = directives.get("cnonce").unwrap_or_default();
        let expected = digest.response_hash(
            &self.credentials,
            request.method.as_str(),
            uri,
            cnonce,
        );

        // `algorithm`, `qop` and `nc` are tokens, never quoted strings.
        let tokens_unquoted = ["algorithm", "qop", "nc"]
            .iter()
            .all(|name| !value.contains(&format!("{name}=\"")));

        tokens_unquoted
            && directives.get("username") == Some(self.credentials.username())
            && uri == expected_uri
            && directives.get("nc") == Some(NONCE_COUNT)
            && directives.get("response") == Some(expected.as_str())
    }
}

/// A recorded tracing event: level plus formatted fields.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: *event.metadata().level(),
                message: visitor.message,
            });
    }
}

/// Events captured on the current thread while the guard is alive.
pub struct CapturedEvents {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    _guard: DefaultGuard,
}

impl CapturedEvents {
    pub fn snapshot(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Installs a thread-local subscriber that records every event at DEBUG and above.
///
/// Only sees events emitted on this thread, which covers the default
/// current-thread test runtime.
pub fn capture_events() -> CapturedEvents {
    let layer = CaptureLayer::default();
    let events = Arc::clone(&layer.events);
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with(layer);
    let guard = tracing::subscriber::set_default(subscriber);
    // Callsites registered earlier under the no-op dispatcher may have cached Interest::never.
    tracing::callsite::rebuild_interest_cache();
    CapturedEvents {
        events,
        _guard: guard,
    }
}
