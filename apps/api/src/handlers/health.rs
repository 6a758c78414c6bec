use crate::{models::HealthResponse, services::Services};
use actix_web::{get, web, HttpResponse};

/// Static service description
#[get("/")]
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Furniture Recommendation API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
        "endpoints": {
            "recommendations": "POST /recommend/",
            "analytics": "GET /analytics/",
            "health": "GET /health"
        }
    }))
}

/// Which upstream dependencies initialized at startup
#[get("/health")]
pub async fn health_check(services: web::Data<Services>) -> HttpResponse {
    let availability = services.availability();

    HttpResponse::Ok().json(HealthResponse {
        status: if availability.all_ready() {
            "healthy"
        } else {
            "degraded"
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        services: availability,
    })
}
