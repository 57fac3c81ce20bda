use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use sizequote_core::pricing::store::PriceTableStore;

#[derive(Clone)]
pub struct HealthState {
    store: Arc<PriceTableStore>,
}

impl HealthState {
    pub fn new(store: Arc<PriceTableStore>) -> Self {
        Self { store }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub price_tables: HealthCheck,
    pub checked_at: String,
}

pub fn router(store: Arc<PriceTableStore>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState::new(store))
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let price_tables = price_table_check(&state.store);
    let ready = price_tables.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "sizequote-server runtime initialized".to_string(),
        },
        price_tables,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn price_table_check(store: &PriceTableStore) -> HealthCheck {
    let unusable = store
        .tables()
        .filter(|table| !table.is_usable())
        .map(|table| table.product().to_string())
        .collect::<Vec<_>>();

    if store.is_empty() {
        HealthCheck { status: "degraded", detail: "no price tables loaded".to_string() }
    } else if !unusable.is_empty() {
        HealthCheck {
            status: "degraded",
            detail: format!("price tables without usable axes: {}", unusable.join(", ")),
        }
    } else {
        HealthCheck { status: "ready", detail: format!("{} price table(s) loaded", store.len()) }
    }
}
