use actix_web::{web, HttpRequest};

use crate::error::ApiError;
use crate::handlers::{get_analytics, health_check, recommend, root};

/// Configure all routes for the API
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .service(root)
        .service(health_check)
        .service(web::resource(["/recommend/", "/recommend"]).route(web::post().to(recommend)))
        .service(web::resource(["/analytics/", "/analytics"]).route(web::get().to(get_analytics)));
}

fn json_error(err: actix_web::error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::InvalidInput(err.to_string()).into()
}
