//! Exposes [TestApp] and [TestAppBuilder] to ease the setup of the
//! test axum server and of the mocked backend.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header;
use axum_test::TestRequest;
use axum_test::TestServer;
use axum_tracing_opentelemetry::middleware::OtelAxumLayer;
use backend_client::BackendClient;
use backend_client::ConnectionSettings;
use backend_client::mocking::MockingBackend;
use common::tracing::Stream;
use common::tracing::Telemetry;
use common::tracing::TracingConfig;
use common::tracing::create_tracing_subscriber;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::SpanData;
use opentelemetry_sdk::trace::SpanExporter;
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use url::Url;

use super::AppState;
use super::ServerConfig;
use super::freshness::FreshnessCache;
use super::layout::SiteConfig;
use super::service_router;
use super::session::SESSION_COOKIE;
use super::submission::SubmissionGuard;
use crate::models::AuthorDirectory;

// NoopSpanExporter exists in 'opentelemetry-sdk' but is hidden behind
// the 'testing' feature
#[derive(Debug)]
struct NoopSpanExporter;

impl NoopSpanExporter {
    fn new() -> Self {
        Self
    }
}

impl SpanExporter for NoopSpanExporter {
    fn export(&self, _: Vec<SpanData>) -> impl std::future::Future<Output = OTelSdkResult> + Send {
        Box::pin(std::future::ready(Ok(())))
    }
}

/// A builder interface for [TestApp]
///
/// Use [TestAppBuilder::default_app] to get an app backed by an empty [MockingBackend].
/// Content freshness is disabled by default so that every read reaches the backend.
pub(crate) struct TestAppBuilder {
    test_name: String,
    backend: Option<MockingBackend>,
    secure_cookies: bool,
    revalidate: std::time::Duration,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            test_name: String::from("casebook-test"),
            backend: None,
            secure_cookies: false,
            revalidate: std::time::Duration::ZERO,
        }
    }

    /// Configures the name of the test, used as the service name of its traces
    pub fn test_name(mut self, test_name: String) -> Self {
        self.test_name = test_name;
        self
    }

    pub fn backend(mut self, backend: MockingBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn secure_cookies(mut self, secure_cookies: bool) -> Self {
        self.secure_cookies = secure_cookies;
        self
    }

    pub fn revalidate(mut self, revalidate: std::time::Duration) -> Self {
        self.revalidate = revalidate;
        self
    }

    pub fn default_app() -> TestApp {
        TestAppBuilder::new().build()
    }

    pub fn build(self) -> TestApp {
        let config = ServerConfig {
            app_version: None,
            port: 0,
            address: String::default(),
            health_check_timeout: chrono::Duration::milliseconds(500),
            backend: ConnectionSettings::new(
                Url::parse("http://backend.test").unwrap(),
                "anon-key".to_owned(),
                "service-key".to_owned(),
            )
            .unwrap(),
            site: SiteConfig::default(),
            revalidate: self.revalidate,
            secure_cookies: self.secure_cookies,
            authors_file: None,
        };

        // Setup tracing
        let tracing_config = TracingConfig {
            stream: Stream::Stdout,
            telemetry: Some(Telemetry {
                service_name: self.test_name.clone(),
            }),
        };
        let sub = create_tracing_subscriber(
            tracing_config,
            tracing_subscriber::filter::LevelFilter::TRACE,
            NoopSpanExporter::new(),
        );
        let tracing_guard = tracing::subscriber::set_default(sub);

        let backend = self.backend.unwrap_or_default();

        let app_state = AppState {
            backend: Arc::new(BackendClient::from(backend.clone())),
            authors: Arc::new(AuthorDirectory::default()),
            freshness: Arc::new(FreshnessCache::new(config.revalidate)),
            submissions: Arc::new(SubmissionGuard::default()),
            health_check_timeout: config.health_check_timeout,
            config: Arc::new(config),
        };

        // Configure the axum router
        let router: Router<()> = service_router(app_state.clone())
            .layer(OtelAxumLayer::default())
            .layer(TraceLayer::new_for_http())
            .with_state(app_state);

        // Run server
        let server = TestServer::new(router).expect("test server should build properly");

        TestApp {
            server,
            backend,
            tracing_guard,
        }
    }
}

/// Returns a default [TestAppBuilder] with the [TestAppBuilder::test_name] set to the current test name
///
/// This **has** to be used in the test function directly to ensure that the test name is correctly set.
///
/// The crate `stdext` is required.
macro_rules! test_app {
    () => {
        $crate::views::test_app::TestAppBuilder::new().test_name(
            stdext::function_name!()
                .split("::")
                .filter(|x| *x != "{{closure}}")
                .collect::<Vec<_>>()
                .join("-"),
        )
    };
}

pub(crate) use test_app;

/// Wraps an underlying, fully configured, axum service
///
/// It also holds the [MockingBackend] the service talks to, so tests can
/// seed it, inject failures and inspect the recorded calls.
pub(crate) struct TestApp {
    server: TestServer,
    backend: MockingBackend,
    #[expect(unused)] // included here to extend its lifetime, not meant to be used in any way
    tracing_guard: tracing::subscriber::DefaultGuard,
}

impl TestApp {
    pub fn backend(&self) -> &MockingBackend {
        &self.backend
    }

    /// The `Cookie` header value carrying the session `access_token`
    pub fn cookie_header(&self, access_token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("{SESSION_COOKIE}={access_token}"))
            .expect("session cookie should be a valid header value")
    }

    /// Sends `req` as the registered user `email`, with a fresh session
    #[track_caller]
    pub fn signed_in(&self, req: TestRequest, email: &str) -> TestRequest {
        let access_token = self
            .backend
            .session_for(email)
            .unwrap_or_else(|| panic!("user '{email}' should be registered in the mocked backend"));
        req.add_header(header::COOKIE, self.cookie_header(&access_token))
    }

    pub async fn fetch(&self, req: TestRequest) -> TestResponse {
        tracing::trace!(request = ?req);
        let response = req.await;
        TestResponse::new(response)
    }

    pub fn get(&self, path: &str) -> TestRequest {
        self.server.get(&trim_path(path))
    }

    pub fn post(&self, path: &str) -> TestRequest {
        self.server.post(&trim_path(path))
    }
}

// The normalizing layer wraps the router and is not part of the test server.
// Since we have control over the paths of our tests, doing this manually is good enough.
fn trim_path(path: &str) -> String {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_owned(),
        _ if path.contains("/?") && path != "/?" => path.replace("/?", "?"),
        _ => path.to_owned(),
    }
}

pub struct TestResponse {
    inner: axum_test::TestResponse,
}

impl TestResponse {
    #[tracing::instrument(name = "Response", level = "debug", skip(inner), fields(status = ?inner.status_code()))]
    fn new(inner: axum_test::TestResponse) -> Self {
        tracing::trace!(response = ?inner);
        Self { inner }
    }

    #[track_caller]
    fn render_response_lossy(self) -> String {
        let bytes = self.inner.into_bytes();
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|json| serde_json::to_string_pretty(&json).ok())
            .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status_code()
    }

    #[track_caller]
    pub fn assert_status(self, expected_status: StatusCode) -> Self {
        let actual_status = self.inner.status_code();
        if actual_status != expected_status {
            let body = self.render_response_lossy();
            pretty_assertions::assert_eq!(
                actual_status,
                expected_status,
                "unexpected status code body={body}"
            );
            unreachable!("should have already panicked")
        } else {
            self
        }
    }

    /// Checks that the response redirects the browser to `location` with a `GET`
    #[track_caller]
    pub fn assert_redirect(self, location: &str) -> Self {
        let response = self.assert_status(StatusCode::SEE_OTHER);
        pretty_assertions::assert_eq!(response.header(header::LOCATION.as_str()), location);
        response
    }

    #[track_caller]
    pub fn header(&self, name: &str) -> String {
        self.inner
            .headers()
            .get(name)
            .unwrap_or_else(|| panic!("response should have a '{name}' header"))
            .to_str()
            .expect("header should be valid UTF-8")
            .to_string()
    }

    pub fn text(self) -> String {
        self.inner.text()
    }

    pub fn bytes(self) -> Vec<u8> {
        self.inner.into_bytes().into()
    }

    #[tracing::instrument(
        name = "Deserialization",
        level = "debug",
        skip(self),
        fields(response_status = ?self.inner.status_code())
    )]
    #[track_caller]
    pub fn json_into<T: DeserializeOwned>(self) -> T {
        let body = self.bytes();
        serde_json::from_slice(body.as_ref()).unwrap_or_else(|err| {
            tracing::error!(error = ?err, "Error deserializing test response into the desired type");
            let actual = String::from_utf8_lossy(&body);
            tracing::error!(body = %actual, "Actual body");
            panic!("could not deserialize test response");
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::trim_path;

    #[rstest]
    #[case("/", "/")]
    #[case("/admin/", "/admin")]
    #[case("/admin", "/admin")]
    #[case("/case-studies/?page=2", "/case-studies?page=2")]
    fn paths_are_trimmed_like_the_normalizing_layer(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(trim_path(path), expected);
    }
}
