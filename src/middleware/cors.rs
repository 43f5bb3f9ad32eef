// CORS configuration
// Lets the mobile client and local dev tools call the API

use actix_cors::Cors;
use actix_web::http::header;
use crate::utils::ACCESS_TOKEN_HEADER;

fn base_cors() -> Cors {
    Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(ACCESS_TOKEN_HEADER),
        ])
        .max_age(3600)
}

/// Development policy: any localhost origin
pub fn create_cors() -> Cors {
    base_cors().allowed_origin_fn(|origin, _req_head| {
        origin.as_bytes().starts_with(b"http://localhost")
            || origin.as_bytes().starts_with(b"https://localhost")
            || origin.as_bytes().starts_with(b"http://127.0.0.1")
            || origin.as_bytes().starts_with(b"https://127.0.0.1")
    })
}

/// Production policy
///
/// # Arguments
/// * `allowed_origins` - exact origins to allow
pub fn create_production_cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(base_cors(), |cors, origin| cors.allowed_origin(origin))
}

/// Pick the policy from configuration; no configured origins means development
pub fn cors_from_origins(allowed_origins: &[String]) -> Cors {
    if allowed_origins.is_empty() {
        create_cors()
    } else {
        create_production_cors(allowed_origins)
    }
}
