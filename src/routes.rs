// Route table

use actix_web::{web, Scope};
use crate::error::{json_config, query_config};
use crate::handlers::*;

/// API v1 routes
///
/// Paths match what the mobile client already calls.
pub fn api_v1_routes() -> Scope {
    web::scope("/api/v1")
        .app_data(json_config())
        .app_data(query_config())
        .configure(payment_routes)
        .configure(order_routes)
}

fn payment_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/initiate-stkpush", web::post().to(initiate_stk_push))
        .route("/verify-payment", web::post().to(verify_payment))
        .route("/callback", web::post().to(mpesa_callback))
        .route("/payments", web::get().to(list_payments));
}

fn order_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/create-order", web::post().to(create_order))
        .route("/get-orders", web::get().to(get_orders));
}

/// Public routes (no authentication)
pub fn public_routes() -> Scope {
    web::scope("")
        .route("/health", web::get().to(health_check))
}
