//! HTTP server for chatbot knowledge-base management.
//!
//! Exposes category and entry CRUD as a JSON API. Entry mutations go
//! through the dual-write [`EntryService`], so a success response means the
//! relational row is committed and the vector index holds the matching
//! record.
//!
//! # Endpoints
//!
//! All paths except `/health` are mounted under `[server].base_path`
//! (default `/api/v1/hr/chatbot`).
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/category` | List categories |
//! | `POST` | `/category` | Create a category |
//! | `GET`  | `/category/{categorySeq}/data` | List a category's entries |
//! | `POST` | `/category/{categorySeq}/data` | Create an entry and its vector record |
//! | `PUT`  | `/category/{categorySeq}/data/{chatbotSeq}` | Replace an entry's content and embedding |
//! | `DELETE` | `/category/{categorySeq}/data/{chatbotSeq}` | Delete an entry and its vector record |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Chatbot category with ID 9 not found." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `sync_failed` (500),
//! `internal` (500).
//!
//! # CORS
//!
//! Origins listed in `[server].allowed_origins` are permitted; an empty
//! list permits any origin.

use anyhow::Context;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use chatbot_kb_core::{EntryService, KbError};

use crate::app::build_service;
use crate::config::{Config, ServerConfig};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    service: EntryService,
}

/// Build the application router around `service`.
///
/// Separate from [`run_server`] so tests can drive the routes directly.
pub fn router(service: EntryService, server: &ServerConfig) -> anyhow::Result<Router> {
    let api = Router::new()
        .route(
            "/category",
            get(handle_list_categories).post(handle_create_category),
        )
        .route(
            "/category/{category_seq}/data",
            get(handle_list_entries).post(handle_create_entry),
        )
        .route(
            "/category/{category_seq}/data/{chatbot_seq}",
            put(handle_update_entry).delete(handle_delete_entry),
        );

    let base_path = server.base_path.trim_end_matches('/');
    let app = if base_path.is_empty() {
        api
    } else {
        Router::new().nest(base_path, api)
    };

    Ok(app
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.allowed_origins)?)
        .with_state(AppState { service }))
}

fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .with_context(|| format!("Invalid server.allowed_origins entry: '{}'", o))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Starts the HTTP server.
///
/// Opens the database (applying the schema), builds the configured
/// providers, and serves until Ctrl-C. `bind` overrides `[server].bind`.
pub async fn run_server(config: &Config, bind: Option<String>) -> anyhow::Result<()> {
    if !config.index.is_persistent() {
        warn!(
            db = %config.db.path.display(),
            "index.provider = \"memory\" keeps vector records only until the server stops; \
             stored entries will have no vector record after a restart"
        );
    }

    let service = build_service(config).await?;
    let app = router(service, &config.server)?;

    let bind_addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    info!(bind = %bind_addr, base_path = %config.server.base_path, "server listening");
    println!("Chatbot KB server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: &'static str,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Reads and category writes: storage failures are plain `internal` errors.
impl From<KbError> for AppError {
    fn from(err: KbError) -> Self {
        match err {
            KbError::CategoryNotFound(_) | KbError::EntryNotFound { .. } => {
                not_found(err.to_string())
            }
            KbError::Validation(_) => bad_request(err.to_string()),
            KbError::Downstream { .. } | KbError::Storage(_) => {
                error!(error = %err, "request failed");
                internal(err.to_string())
            }
        }
    }
}

/// Entry mutations: anything past validation becomes `sync_failed`.
///
/// `verb` is `add`, `update` or `delete`.
fn sync_error(verb: &str, err: KbError) -> AppError {
    match err {
        KbError::Downstream { .. } | KbError::Storage(_) => {
            error!(action = verb, error = %err, "chatbot data sync failed");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "sync_failed",
                message: format!("Failed to {} chatbot data: {}", verb, err),
            }
        }
        other => other.into(),
    }
}

fn path_error(rejection: PathRejection) -> AppError {
    bad_request(rejection.body_text())
}

fn json_error(rejection: JsonRejection) -> AppError {
    bad_request(rejection.body_text())
}

// ============ Request / response bodies ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryRequest {
    category_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryRequest {
    chatbot_data: String,
}

#[derive(Serialize)]
struct ListResponse<T> {
    success: bool,
    data: Vec<T>,
}

impl<T> ListResponse<T> {
    fn ok(data: Vec<T>) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Serialize)]
struct CategoryItem {
    id: i64,
    name: String,
}

#[derive(Serialize)]
struct EntryItem {
    id: i64,
    content: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
}

fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message, id: None })
}

fn created(message: &'static str, id: i64) -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::CREATED,
        Json(MessageResponse {
            message,
            id: Some(id),
        }),
    )
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ Categories ============

async fn handle_list_categories(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<CategoryItem>>, AppError> {
    let categories = state.service.list_categories().await?;
    Ok(ListResponse::ok(
        categories
            .into_iter()
            .map(|c| CategoryItem {
                id: c.id,
                name: c.name,
            })
            .collect(),
    ))
}

async fn handle_create_category(
    State(state): State<AppState>,
    body: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let Json(body) = body.map_err(json_error)?;
    let category = state.service.create_category(&body.category_name).await?;
    Ok(created("Chatbot category added successfully.", category.id))
}

// ============ Entries ============

/// `GET /category/{categorySeq}/data`
async fn handle_list_entries(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ListResponse<EntryItem>>, AppError> {
    let Path(category_seq) = path.map_err(path_error)?;
    let entries = state.service.list_entries(category_seq).await?;
    Ok(ListResponse::ok(
        entries
            .into_iter()
            .map(|e| EntryItem {
                id: e.id,
                content: e.content,
            })
            .collect(),
    ))
}

/// `POST /category/{categorySeq}/data`
async fn handle_create_entry(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<EntryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let Path(category_seq) = path.map_err(path_error)?;
    let Json(body) = body.map_err(json_error)?;

    let entry = state
        .service
        .create_entry(category_seq, &body.chatbot_data)
        .await
        .map_err(|e| sync_error("add", e))?;

    Ok(created("Chatbot data added successfully.", entry.id))
}

/// `PUT /category/{categorySeq}/data/{chatbotSeq}`
async fn handle_update_entry(
    State(state): State<AppState>,
    path: Result<Path<(i64, i64)>, PathRejection>,
    body: Result<Json<EntryRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path((category_seq, chatbot_seq)) = path.map_err(path_error)?;
    let Json(body) = body.map_err(json_error)?;

    state
        .service
        .update_entry(category_seq, chatbot_seq, &body.chatbot_data)
        .await
        .map_err(|e| sync_error("update", e))?;

    Ok(message("Chatbot data updated successfully."))
}

/// `DELETE /category/{categorySeq}/data/{chatbotSeq}`
async fn handle_delete_entry(
    State(state): State<AppState>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path((category_seq, chatbot_seq)) = path.map_err(path_error)?;

    state
        .service
        .delete_entry(category_seq, chatbot_seq)
        .await
        .map_err(|e| sync_error("delete", e))?;

    Ok(message("Chatbot data deleted successfully."))
}
