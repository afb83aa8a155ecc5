// Web server: Axum JSON API for content reactions, YouTube lookups and
// API key administration.
//
// All /api/* routes speak JSON. Errors come back as {"error": message} with
// a status code that tells the caller whether retrying can help.

use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::db::Database;
use crate::quota::credential::load_credentials;
use crate::quota::{Credential, FetchError, QuotaRotatingFetcher};
use crate::reactions::{LedgerOptions, ReactionError, ReactionLedger};
use crate::youtube::client::YouTubeClient;

pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub config: Arc<Config>,
    pub youtube: Arc<YouTubeClient>,
    pub fetcher: QuotaRotatingFetcher,
    pub ledger: ReactionLedger,
}

impl AppState {
    /// Wire every component to the one shared database handle.
    pub fn new(config: Config, db: Arc<dyn Database>) -> Result<Self> {
        let youtube = YouTubeClient::new(&config.youtube_api_url)?;
        let fetcher = QuotaRotatingFetcher::new(config.fatal_policy());
        let ledger = ReactionLedger::with_options(
            db.clone(),
            LedgerOptions {
                report_policy: config.report_policy,
                ..LedgerOptions::default()
            },
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            youtube: Arc::new(youtube),
            fetcher,
            ledger,
        })
    }

    /// Current rotation list. Read per request so key changes made through
    /// /api/keys apply immediately.
    pub async fn credentials(&self) -> Result<Vec<Credential>> {
        load_credentials(&self.config.youtube_api_keys, self.db.as_ref()).await
    }
}

/// Start the Axum web server and block until it exits.
///
/// Ctrl+C or SIGTERM stops accepting connections and lets in-flight
/// requests finish before returning.
pub async fn run_server(
    config: Config,
    db: Arc<dyn Database>,
    port: u16,
    bind: &str,
) -> Result<()> {
    let state = AppState::new(config, db)?;
    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!("Tubekit API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/content",
            get(handlers::content::list_content).post(handlers::content::create_content),
        )
        .route(
            "/api/content/{id}",
            get(handlers::content::get_content).delete(handlers::content::delete_content),
        )
        .route(
            "/api/content/{id}/reactions",
            patch(handlers::reactions::apply_reaction),
        )
        .route(
            "/api/content/{id}/reports/fixed",
            post(handlers::reactions::mark_report_fixed),
        )
        .route("/api/youtube/videos/{id}", get(handlers::youtube::get_video))
        .route(
            "/api/youtube/channels/{id}/videos",
            get(handlers::youtube::list_channel_videos),
        )
        .route(
            "/api/youtube/playlists/{id}/videos",
            get(handlers::youtube::list_playlist_videos),
        )
        .route(
            "/api/keys",
            get(handlers::keys::list_keys).post(handlers::keys::add_key),
        )
        .route("/api/keys/{id}", patch(handlers::keys::update_key));

    Router::new()
        .merge(api)
        .route("/health", get(health))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check: always returns 200 OK.
async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "status": "ok" })),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}

/// Map a ledger error to its HTTP response.
pub fn reaction_error(err: &ReactionError) -> Response {
    let status = match err {
        ReactionError::ContentNotFound(_) | ReactionError::ReportNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        ReactionError::InvalidAction(_)
        | ReactionError::MissingReportText
        | ReactionError::MissingUserId => StatusCode::BAD_REQUEST,
        ReactionError::DuplicateReport(_) | ReactionError::AlreadyActed { .. } => {
            StatusCode::CONFLICT
        }
        ReactionError::Store(e) => {
            error!(error = %format!("{e:#}"), "Reaction store failure");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };
    api_error(status, &err.to_string())
}

/// Map a quota fetch failure to its HTTP response.
pub fn fetch_error(err: &FetchError) -> Response {
    let status = match err {
        FetchError::AllCredentialsExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        FetchError::Aborted { .. } => StatusCode::BAD_GATEWAY,
        FetchError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
    };
    api_error(status, &err.to_string())
}

/// Log an internal failure and hide its details from the caller.
pub fn internal_error(err: &anyhow::Error, what: &str) -> Response {
    error!(error = %format!("{err:#}"), "{what}");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
}
