// crates/certsync-server/src/server.rs
// ============================================================================
// Module: Registry HTTP Server
// Description: Axum routes over the ingestion service.
// Purpose: Expose ingestion, expiry reads, and allow-list management over HTTP.
// Dependencies: axum, certsync-config, certsync-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! Handlers are thin: they pull headers, path segments, and raw bodies out of
//! the request and hand them to [`IngestionService`]. Registry calls are
//! synchronous, so handlers move onto a blocking-capable thread before
//! calling the service.
//!
//! Security posture: inputs are untrusted and must be validated; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path as UrlPath;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use certsync_config::CertsyncConfig;
use certsync_config::ServerConfig;
use certsync_core::PRODUCER_INSTANCE_HEADER;
use certsync_store_sqlite::SqliteRegistry;
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::audit::FileIngestAuditSink;
use crate::audit::IngestAuditSink;
use crate::audit::NoopIngestAuditSink;
use crate::audit::StderrIngestAuditSink;
use crate::auth::TokenSet;
use crate::service::ApiResponse;
use crate::service::IngestionService;
use crate::service::IngestionServiceParams;
use crate::service::SubmitRequest;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Registry Server
// ============================================================================

/// Registry server instance.
pub struct RegistryServer {
    /// Listener address.
    bind: SocketAddr,
    /// Shared route implementations.
    service: Arc<IngestionService>,
}

impl RegistryServer {
    /// Builds the server from configuration, opening the `SQLite` registry.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the store section is missing, the bind
    /// address is invalid, or the store or audit log cannot be opened.
    pub fn from_config(config: &CertsyncConfig) -> Result<Self, ServerError> {
        let store = config.require_store().map_err(|err| ServerError::Config(err.to_string()))?;
        let bind = config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let registry = Arc::new(
            SqliteRegistry::new(store.clone()).map_err(|err| ServerError::Init(err.to_string()))?,
        );
        let audit = build_audit_sink(&config.server)?;
        let service = IngestionService::new(IngestionServiceParams {
            certificates: registry.clone(),
            producers: registry,
            audit,
            ingest_tokens: TokenSet::new(&config.server.auth.ingest_tokens),
            admin_tokens: TokenSet::new(&config.server.auth.admin_tokens),
            max_body_bytes: config.server.max_body_bytes,
            expiring_horizon_days: config.server.expiring_horizon_days,
        });
        emit_open_surface_warning(&config.server);
        Ok(Self {
            bind,
            service: Arc::new(service),
        })
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        axum::serve(listener, build_router(self.service))
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Builds the audit sink selected by `[server.audit]`.
fn build_audit_sink(server: &ServerConfig) -> Result<Arc<dyn IngestAuditSink>, ServerError> {
    if !server.audit.enabled {
        return Ok(Arc::new(NoopIngestAuditSink));
    }
    match &server.audit.path {
        Some(path) => {
            let sink = FileIngestAuditSink::new(Path::new(path))
                .map_err(|err| ServerError::Init(format!("audit log unavailable: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrIngestAuditSink)),
    }
}

/// Warns when a surface accepts requests without credentials.
fn emit_open_surface_warning(server: &ServerConfig) {
    if server.auth.ingest_tokens.is_empty() || server.auth.admin_tokens.is_empty() {
        let _ = writeln!(
            io::stderr(),
            "certsync-server: WARNING: a surface is running without bearer tokens on {}; \
             configure server.auth to require credentials",
            server.bind
        );
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the axum router for every registry route.
pub fn build_router(service: Arc<IngestionService>) -> Router {
    let body_limit = service.max_body_bytes().saturating_add(1);
    Router::new()
        .route("/api/certificate-data", post(handle_submit))
        .route("/api/certificates/expiring", get(handle_expiring))
        .route("/api/certificates/{ca_id}/{serial_number}", get(handle_certificate))
        .route("/api/manage/producers", get(handle_list_producers).post(handle_create_producer))
        .route(
            "/api/manage/producers/{producer_id}",
            get(handle_get_producer).put(handle_update_producer).delete(handle_deactivate_producer),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Query parameters for the expiring read.
#[derive(Debug, Deserialize)]
struct ExpiringQuery {
    /// Horizon in days.
    days: Option<String>,
}

/// Handles certificate submissions.
async fn handle_submit(
    State(service): State<Arc<IngestionService>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResponse {
    let request = SubmitRequest {
        authorization: header_value(&headers, AUTHORIZATION.as_str()),
        instance_id: header_value(&headers, PRODUCER_INSTANCE_HEADER),
        body: &body,
    };
    run_blocking(|| service.submit(&request))
}

/// Handles the expiring-certificates read.
async fn handle_expiring(
    State(service): State<Arc<IngestionService>>,
    headers: HeaderMap,
    Query(query): Query<ExpiringQuery>,
) -> ApiResponse {
    let authorization = header_value(&headers, AUTHORIZATION.as_str());
    run_blocking(|| service.expiring(authorization, query.days.as_deref()))
}

/// Handles the single-certificate read.
async fn handle_certificate(
    State(service): State<Arc<IngestionService>>,
    headers: HeaderMap,
    UrlPath((ca_id, serial_number)): UrlPath<(String, String)>,
) -> ApiResponse {
    let authorization = header_value(&headers, AUTHORIZATION.as_str());
    run_blocking(|| service.certificate(authorization, &ca_id, &serial_number))
}

/// Handles allow-list listing.
async fn handle_list_producers(
    State(service): State<Arc<IngestionService>>,
    headers: HeaderMap,
) -> ApiResponse {
    let authorization = header_value(&headers, AUTHORIZATION.as_str());
    run_blocking(|| service.list_producers(authorization))
}

/// Handles allow-list creation.
async fn handle_create_producer(
    State(service): State<Arc<IngestionService>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResponse {
    let authorization = header_value(&headers, AUTHORIZATION.as_str());
    run_blocking(|| service.create_producer(authorization, &body))
}

/// Handles allow-list reads.
async fn handle_get_producer(
    State(service): State<Arc<IngestionService>>,
    headers: HeaderMap,
    UrlPath(producer_id): UrlPath<String>,
) -> ApiResponse {
    let authorization = header_value(&headers, AUTHORIZATION.as_str());
    run_blocking(|| service.producer(authorization, &producer_id))
}

/// Handles allow-list replacement.
async fn handle_update_producer(
    State(service): State<Arc<IngestionService>>,
    headers: HeaderMap,
    UrlPath(producer_id): UrlPath<String>,
    body: Bytes,
) -> ApiResponse {
    let authorization = header_value(&headers, AUTHORIZATION.as_str());
    run_blocking(|| service.update_producer(authorization, &producer_id, &body))
}

/// Handles allow-list soft deletion.
async fn handle_deactivate_producer(
    State(service): State<Arc<IngestionService>>,
    headers: HeaderMap,
    UrlPath(producer_id): UrlPath<String>,
) -> ApiResponse {
    let authorization = header_value(&headers, AUTHORIZATION.as_str());
    run_blocking(|| service.deactivate_producer(authorization, &producer_id))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns a header as text when present and valid.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Runs a registry call, shifting to a blocking context when available.
fn run_blocking<T>(call: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(call)
        }
        _ => call(),
    }
}
