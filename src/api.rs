//! Local HTTP surface: health, status snapshot, manual (gate-bypassing)
//! checks, and Prometheus metrics.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::coordinator::{Coordinator, CycleReport, StatusSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/check/news", post(check_news))
        .route("/check/stock", post(check_stock))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.coordinator.status().await)
}

#[derive(Serialize)]
struct CheckResp {
    manual: bool,
    report: CycleReport,
}

/// User-initiated check; bypasses the quiet gate.
async fn check_news(State(state): State<AppState>) -> Json<CheckResp> {
    let report = state.coordinator.run_news_cycle(true).await;
    Json(CheckResp {
        manual: true,
        report,
    })
}

async fn check_stock(State(state): State<AppState>) -> Json<CheckResp> {
    let report = state.coordinator.run_stock_cycle(true).await;
    Json(CheckResp {
        manual: true,
        report,
    })
}
