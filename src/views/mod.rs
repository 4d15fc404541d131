pub mod admin;
pub mod freshness;
pub mod layout;
mod public;
pub mod session;
pub mod submission;

#[cfg(test)]
mod test_app;
#[cfg(test)]
pub(crate) use test_app::test_app;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::ServiceExt;
use axum::extract::DefaultBodyLimit;
use axum::extract::FromRef;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use axum_tracing_opentelemetry::middleware::OtelAxumLayer;
use backend_client::BackendClient;
use backend_client::ConnectionSettings;
use chrono::Duration;
use common::Version;
use serde_json::Value;
use tokio::time::timeout;
use tower::Layer as _;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::normalize_path::NormalizePath;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument as _;
use tracing::info;

use self::freshness::FreshnessCache;
use self::layout::SiteConfig;
use self::submission::SubmissionGuard;
use crate::error::CasebookError;
use crate::error::Result;
use crate::models::AuthorDirectory;

/// Thumbnails are the largest payloads the admin panel accepts
const REQUEST_PAYLOAD_LIMIT: usize = 10 * 1024 * 1024;

/// Builds the routes of the public site and the admin panel
///
/// Every admin route but the login page sits behind [session::session_guard].
pub(crate) fn service_router(app_state: AppState) -> Router<AppState> {
    let guarded = Router::new()
        .route("/admin", get(admin::list))
        .route(
            "/admin/case-studies/new",
            get(admin::new_form).post(admin::create),
        )
        .route(
            "/admin/case-studies/{id}/edit",
            get(admin::edit_form).post(admin::update),
        )
        .route(
            "/admin/case-studies/{id}/delete",
            get(admin::delete_confirmation).post(admin::delete),
        )
        .route("/admin/logout", post(session::logout))
        .route_layer(axum::middleware::from_fn_with_state(
            app_state,
            session::session_guard,
        ));

    Router::new()
        .route("/", get(public::list))
        .route("/case-studies/{slug}", get(public::detail))
        .route(
            session::LOGIN_PATH,
            get(session::login_form).post(session::login),
        )
        .route("/health", get(health))
        .route("/version", get(version))
        .merge(guarded)
}

#[derive(Debug, thiserror::Error)]
pub enum AppHealthError {
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Backend(#[from] backend_client::Error),
}

impl CasebookError for AppHealthError {
    fn get_status(&self) -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }

    fn get_type(&self) -> &str {
        match self {
            AppHealthError::Timeout => "casebook:app_health:Timeout",
            AppHealthError::Backend(_) => "casebook:app_health:Backend",
        }
    }

    fn context(&self) -> HashMap<String, Value> {
        Default::default()
    }
}

async fn health(
    State(AppState {
        backend,
        health_check_timeout,
        ..
    }): State<AppState>,
) -> Result<&'static str> {
    check_health(&backend, health_check_timeout).await?;
    Ok("ok")
}

/// Pings the backend, failing if it does not answer within `health_check_timeout`
pub async fn check_health(
    backend: &BackendClient,
    health_check_timeout: Duration,
) -> std::result::Result<(), AppHealthError> {
    let health_check_timeout = health_check_timeout
        .to_std()
        .unwrap_or(std::time::Duration::ZERO);
    timeout(health_check_timeout, backend.ping())
        .await
        .map_err(|_| AppHealthError::Timeout)??;
    Ok(())
}

pub(in crate::views) async fn version(
    State(AppState { config, .. }): State<AppState>,
) -> Json<Version> {
    Json(Version {
        git_describe: config.app_version.clone(),
    })
}

pub struct ServerConfig {
    pub port: u16,
    pub address: String,
    pub health_check_timeout: Duration,
    pub backend: ConnectionSettings,
    pub site: SiteConfig,
    /// How long public pages may serve content read from the store before reading it again
    pub revalidate: std::time::Duration,
    pub secure_cookies: bool,
    pub authors_file: Option<PathBuf>,
    pub app_version: Option<String>,
}

pub struct Server {
    app_state: AppState,
    router: NormalizePath<Router>,
}

/// The state of the whole service, available to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub backend: Arc<BackendClient>,
    pub authors: Arc<AuthorDirectory>,
    pub freshness: Arc<FreshnessCache>,
    pub submissions: Arc<SubmissionGuard>,
    pub health_check_timeout: Duration,
}

impl FromRef<AppState> for Arc<BackendClient> {
    fn from_ref(input: &AppState) -> Self {
        input.backend.clone()
    }
}

impl FromRef<AppState> for Arc<AuthorDirectory> {
    fn from_ref(input: &AppState) -> Self {
        input.authors.clone()
    }
}

impl AppState {
    #[tracing::instrument(skip_all, level = "info", err, name = "AppState initialization")]
    async fn init(config: ServerConfig) -> anyhow::Result<Self> {
        #[tracing::instrument(skip_all, level = "info", err, name = "author directory loading")]
        async fn load_authors(path: Option<PathBuf>) -> anyhow::Result<AuthorDirectory> {
            match path {
                Some(path) => {
                    let authors = tokio::task::spawn_blocking(move || {
                        AuthorDirectory::from_yaml_file(&path)
                    })
                    .await??;
                    Ok(authors)
                }
                None => {
                    tracing::info!("no author file configured, using the built-in directory");
                    Ok(AuthorDirectory::default())
                }
            }
        }
        let authors = load_authors(config.authors_file.clone()).await?;

        let backend = BackendClient::new(config.backend.clone());
        tracing::info!(url = %config.backend.url(), "backend client configured");

        Ok(Self {
            backend: Arc::new(backend),
            authors: Arc::new(authors),
            freshness: Arc::new(FreshnessCache::new(config.revalidate)),
            submissions: Arc::new(SubmissionGuard::default()),
            health_check_timeout: config.health_check_timeout,
            config: Arc::new(config),
        })
    }
}

impl Server {
    #[tracing::instrument(skip_all, err, level = "info", name = "server initialization")]
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        info!("Building server...");
        let app_state = tokio::spawn(AppState::init(config).in_current_span()).await??;
        let router = tracing::debug_span!("router initialization")
            .in_scope(|| service_router(app_state.clone()));

        let request_payload_limit = RequestBodyLimitLayer::new(REQUEST_PAYLOAD_LIMIT);

        let router: Router<()> = router
            .layer(OtelAxumLayer::default())
            .layer(DefaultBodyLimit::disable())
            .layer(request_payload_limit)
            .layer(TraceLayer::new_for_http())
            .with_state(app_state.clone());
        let normalizing_router = NormalizePathLayer::trim_trailing_slash().layer(router);

        Ok(Self {
            app_state,
            router: normalizing_router,
        })
    }

    pub async fn start(self) -> std::io::Result<()> {
        let Self { app_state, router } = self;
        let ServerConfig {
            address,
            port,
            secure_cookies,
            ..
        } = app_state.config.as_ref();

        if !*secure_cookies {
            tracing::warn!("session cookies are not restricted to HTTPS");
        }

        info!(%address, port, "Running server...");
        let service = ServiceExt::<axum::extract::Request>::into_make_service(router);
        let listener = tokio::net::TcpListener::bind((address.as_str(), *port)).await?;
        axum::serve(listener, service).await
    }
}
