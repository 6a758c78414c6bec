use crate::{error::ApiError, services::Services};
use actix_web::{web, HttpResponse};

/// Brand, category and price statistics over the product dataset.
pub async fn get_analytics(services: web::Data<Services>) -> Result<HttpResponse, ApiError> {
    let analytics = services.analytics.analytics()?;
    Ok(HttpResponse::Ok().json(analytics))
}
