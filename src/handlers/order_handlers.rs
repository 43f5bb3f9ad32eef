// Order handlers

use actix_web::{web, HttpResponse};
use crate::error::ServiceResult;
use crate::middleware::require_role;
use crate::models::{ApiResponse, AuthenticatedUser, CreateOrderRequest, ADMIN_ROLE};
use crate::state::AppState;

/// Order a course against a completed M-Pesa payment
///
/// POST /api/v1/create-order
///
/// Requires an access token
/// Body: CreateOrderRequest
/// Response: 201 OrderResponse
pub async fn create_order(
    data: web::Data<AppState>,
    user: AuthenticatedUser,
    request: web::Json<CreateOrderRequest>,
) -> ServiceResult<HttpResponse> {
    let fulfilment = data
        .order_service()
        .create_order(&user, request.into_inner())
        .await?;

    let message = if fulfilment.created {
        "Order created successfully"
    } else {
        "Order already exists for this payment"
    };

    Ok(HttpResponse::Created().json(
        ApiResponse::success_with_message(fulfilment.order.to_response(), message).with_code(201),
    ))
}

/// All orders
///
/// GET /api/v1/get-orders
///
/// Requires an admin access token
pub async fn get_orders(
    data: web::Data<AppState>,
    user: AuthenticatedUser,
) -> ServiceResult<HttpResponse> {
    require_role(&user, ADMIN_ROLE)?;

    let orders = data.order_service().list_orders().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(orders)))
}
