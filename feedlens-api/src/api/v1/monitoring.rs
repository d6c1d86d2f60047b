use crate::services::{HealthService, ServiceMetrics};
use actix_web::{web, HttpResponse, Result as ActixResult};

// Prometheus metrics endpoint
pub async fn metrics(metrics: web::Data<ServiceMetrics>) -> ActixResult<HttpResponse> {
    match metrics.render_metrics() {
        Ok(metrics_text) => Ok(HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(metrics_text)),
        Err(e) => Ok(HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "Failed to render metrics",
            "details": e.to_string()
        }))),
    }
}

// Health check endpoint
pub async fn health(health: web::Data<HealthService>) -> ActixResult<HttpResponse> {
    let health_status = health.check_health().await;

    if health_status.status == "healthy" {
        Ok(HttpResponse::Ok().json(health_status))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(health_status))
    }
}
