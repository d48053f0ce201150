use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use super::ApiState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub sandbox: bool,
    pub provider_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
}

fn component(up: bool) -> String {
    if up { "up" } else { "down" }.to_string()
}

pub async fn health_check(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let version = env!("CARGO_PKG_VERSION").to_string();

    #[cfg(feature = "database")]
    let database = match &state.db {
        Some(pool) => Some(crate::database::health_check(pool).await.is_ok()),
        None => None,
    };
    #[cfg(not(feature = "database"))]
    let database: Option<bool> = None;

    // The delivery journal is optional; Redis being down only degrades
    #[cfg(feature = "cache")]
    let cache = match &state.redis {
        Some(pool) => Some(crate::cache::health_check(pool).await.is_ok()),
        None => None,
    };
    #[cfg(not(feature = "cache"))]
    let cache: Option<bool> = None;

    let healthy = database.unwrap_or(true) && state.service.provider_configured;

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version,
        environment: state.service.environment.clone(),
        sandbox: state.service.sandbox,
        provider_configured: state.service.provider_configured,
        database: database.map(component),
        cache: cache.map(component),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
