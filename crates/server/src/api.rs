use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sizequote_agent::runtime::{QuoteRuntime, SubmissionOutcome};
use sizequote_core::domain::quote::{QuoteResult, SubmissionId};
use sizequote_core::errors::InterfaceError;
use sizequote_core::session::{DebugEntry, QuoteSession};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One shared session per server process; submissions are serialized through its lock.
#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<QuoteRuntime>,
    pub session: Arc<Mutex<QuoteSession>>,
}

impl ApiState {
    pub fn new(runtime: Arc<QuoteRuntime>) -> Self {
        Self { runtime, session: Arc::new(Mutex::new(QuoteSession::new())) }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmissionRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub number: Option<usize>,
    pub total: Option<Decimal>,
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub number: usize,
    pub total: Decimal,
    pub result: QuoteResult,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub results: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct DebugLogResponse {
    pub entries: Vec<DebugEntry>,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub product: String,
    pub widths: Vec<u32>,
    pub heights: Vec<u32>,
    pub aliases: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<ProductSummary>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub correlation_id: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/submissions", post(submit))
        .route("/api/v1/history", get(history))
        .route("/api/v1/debug-log", get(debug_log))
        .route("/api/v1/session", delete(reset_session))
        .route("/api/v1/products", get(products))
        .with_state(state)
}

pub async fn submit(
    State(state): State<ApiState>,
    Json(body): Json<SubmissionRequest>,
) -> Result<Json<SubmissionResponse>, (StatusCode, Json<ApiError>)> {
    let id = SubmissionId::generate();
    let mut session = state.session.lock().await;

    let outcome = state
        .runtime
        .submit_with_id(&mut session, id.clone(), &body.text)
        .await
        .map_err(|error| interface_error(error.into_interface(id.as_str())))?;

    let total = match &outcome {
        SubmissionOutcome::Quoted { result } => Some(result.total()),
        SubmissionOutcome::NotFound { .. } => None,
    };
    let number = Some(session.len());

    Ok(Json(SubmissionResponse { number, total, outcome }))
}

pub async fn history(State(state): State<ApiState>) -> Json<HistoryResponse> {
    let session = state.session.lock().await;
    let results = session
        .numbered_history()
        .map(|(number, result)| HistoryEntry {
            number,
            total: result.total(),
            result: result.clone(),
        })
        .collect();

    Json(HistoryResponse { results })
}

pub async fn debug_log(State(state): State<ApiState>) -> Json<DebugLogResponse> {
    let session = state.session.lock().await;
    let log = session.debug_log();

    Json(DebugLogResponse { entries: log.entries().to_vec(), text: log.render() })
}

pub async fn reset_session(State(state): State<ApiState>) -> StatusCode {
    let mut session = state.session.lock().await;
    let cleared = session.len();
    session.reset();

    info!(
        event_name = "quote.session.reset",
        correlation_id = "session",
        cleared_results = cleared,
        "session history and debug log cleared"
    );

    StatusCode::NO_CONTENT
}

pub async fn products(State(state): State<ApiState>) -> Json<ProductsResponse> {
    let aliases = state.runtime.aliases();
    let products = state
        .runtime
        .store()
        .tables()
        .map(|table| ProductSummary {
            product: table.product().to_string(),
            widths: table.widths().to_vec(),
            heights: table.heights().to_vec(),
            aliases: aliases
                .aliases_for(table.product())
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        })
        .collect();

    Json(ProductsResponse { products })
}

fn interface_error(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let (status, class) = match &error {
        InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
        InterfaceError::UpstreamReply { fault, .. } => (StatusCode::BAD_GATEWAY, fault.as_str()),
        InterfaceError::ServiceUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
        }
        InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };

    warn!(
        event_name = "quote.api.error",
        correlation_id = %error.correlation_id(),
        error = %error,
        "submission rejected"
    );

    (
        status,
        Json(ApiError {
            error: class.to_string(),
            message: error.user_message().to_string(),
            detail: error.detail().map(str::to_string),
            correlation_id: error.correlation_id().to_string(),
        }),
    )
}
