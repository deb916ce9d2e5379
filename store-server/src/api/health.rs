//! Health Check API

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::core::ServerState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
