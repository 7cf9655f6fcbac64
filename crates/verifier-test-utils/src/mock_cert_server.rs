//! Mock certificate endpoint
//!
//! Wraps a wiremock `MockServer` that serves the provider's certificate
//! document (`{"<kid>": "<PEM>"}`) at `/certs`.

use crate::crypto_fixtures::default_certificates;
use serde_json::{Map, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CERT_PATH: &str = "/certs";

/// Mock certificate server for verifier tests.
pub struct MockCertServer {
    server: MockServer,
}

impl MockCertServer {
    /// Start a server with nothing mounted.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URI of the server.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// URL of the certificate document.
    pub fn cert_url(&self) -> String {
        format!("{}{}", self.server.uri(), CERT_PATH)
    }

    /// Serve `entries` as the certificate document.
    ///
    /// When `max_age` is set the response carries
    /// `Cache-Control: public, max-age=<max_age>`.
    pub async fn serve_certificates(&self, entries: &[(&str, &str)], max_age: Option<u64>) {
        Mock::given(method("GET"))
            .and(path(CERT_PATH))
            .respond_with(certificate_response(entries, max_age))
            .mount(&self.server)
            .await;
    }

    /// Serve both test certificates with no cache directive.
    pub async fn serve_default_certificates(&self) {
        self.serve_certificates(&default_certificates(), None).await;
    }

    /// Serve `entries`, asserting on drop that exactly `expected_calls`
    /// requests arrived.
    pub async fn serve_certificates_expecting(
        &self,
        entries: &[(&str, &str)],
        max_age: Option<u64>,
        expected_calls: u64,
    ) {
        Mock::given(method("GET"))
            .and(path(CERT_PATH))
            .respond_with(certificate_response(entries, max_age))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Serve `entries` after `delay`.
    pub async fn serve_with_delay(&self, entries: &[(&str, &str)], delay: Duration) {
        Mock::given(method("GET"))
            .and(path(CERT_PATH))
            .respond_with(certificate_response(entries, None).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// Answer every request with `status` and an empty body.
    pub async fn serve_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(CERT_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Drop all mounted responses and recorded requests.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Number of requests received so far.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

fn certificate_response(entries: &[(&str, &str)], max_age: Option<u64>) -> ResponseTemplate {
    let body: Map<String, Value> = entries
        .iter()
        .map(|(kid, pem)| ((*kid).to_string(), Value::String((*pem).to_string())))
        .collect();

    let template = ResponseTemplate::new(200).set_body_json(Value::Object(body));
    match max_age {
        Some(seconds) => {
            template.insert_header("cache-control", format!("public, max-age={seconds}").as_str())
        }
        None => template,
    }
}
