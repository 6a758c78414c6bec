use crate::{error::ApiError, models::RecommendationRequest, services::Services};
use actix_web::{
    web::{self, Json},
    HttpResponse,
};
use tracing::debug;

/// Recommend furniture for a free-text query.
///
/// Returns 503 when the embedding model or the vector index did not come
/// up at startup, and 500 when an upstream call fails mid-request.
pub async fn recommend(
    request: Json<RecommendationRequest>,
    services: web::Data<Services>,
) -> Result<HttpResponse, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::InvalidInput("Query cannot be empty".to_string()));
    }

    if request.top_k == 0 {
        return Err(ApiError::InvalidInput(
            "top_k must be a positive integer".to_string(),
        ));
    }

    debug!("Recommendation request: query='{}' top_k={}", request.query, request.top_k);

    let response = services.recommendation.recommend(&request).await?;
    Ok(HttpResponse::Ok().json(response))
}
