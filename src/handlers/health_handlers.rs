// Health check handler

use actix_web::{http::StatusCode, web, HttpResponse, Result as ActixResult};
use serde::Serialize;
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Database connectivity
    pub database: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Basic health check
///
/// GET /health
///
/// No authentication
/// Response: HealthResponse, 503 when the database is unreachable
pub async fn health_check(
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let mut health = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: "unknown".to_string(),
        timestamp: chrono::Utc::now(),
    };

    match sqlx::query("SELECT 1").execute(&data.db_pool).await {
        Ok(_) => {
            health.database = "connected".to_string();
        }
        Err(e) => {
            log::error!("Database health check failed: {}", e);
            health.database = "disconnected".to_string();
            health.status = "unhealthy".to_string();
        }
    }

    let status_code = if health.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok(HttpResponse::build(status_code).json(health))
}
