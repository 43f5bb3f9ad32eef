// Payment handlers
// STK push initiation, verification polling, Daraja callbacks and history

use actix_web::{web, HttpResponse};
use crate::error::ServiceResult;
use crate::models::{
    ApiResponse, AuthenticatedUser, InitiatePaymentRequest, PaymentListQuery, PaymentStatus,
    StkCallbackEnvelope, VerifyPaymentRequest,
};
use crate::services::CallbackReference;
use crate::state::AppState;

/// Start an M-Pesa STK push
///
/// POST /api/v1/initiate-stkpush
///
/// Requires an access token
/// Body: InitiatePaymentRequest
/// Response: InitiatePaymentResponse
pub async fn initiate_stk_push(
    data: web::Data<AppState>,
    user: AuthenticatedUser,
    request: web::Json<InitiatePaymentRequest>,
) -> ServiceResult<HttpResponse> {
    let response = data
        .payment_service()
        .initiate_payment(&user, request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        response,
        "STK push sent. Check your phone to complete the payment",
    )))
}

/// Verify a payment and create its order
///
/// POST /api/v1/verify-payment
///
/// Requires an access token
/// Body: VerifyPaymentRequest
/// Response: VerifyPaymentResponse; 202 while the customer has not answered
pub async fn verify_payment(
    data: web::Data<AppState>,
    user: AuthenticatedUser,
    request: web::Json<VerifyPaymentRequest>,
) -> ServiceResult<HttpResponse> {
    let outcome = data
        .payment_service()
        .verify_payment(&user, request.into_inner())
        .await?;

    if outcome.response.payment_status == PaymentStatus::Completed {
        Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            outcome.response,
            outcome.message,
        )))
    } else {
        Ok(HttpResponse::Accepted().json(
            ApiResponse::success_with_message(outcome.response, outcome.message).with_code(202),
        ))
    }
}

/// Daraja STK result callback
///
/// POST /api/v1/callback?ref=..&sig=..
///
/// No access token; the query carries the signed payment reference
/// Body: StkCallbackEnvelope
pub async fn mpesa_callback(
    data: web::Data<AppState>,
    reference: web::Query<CallbackReference>,
    envelope: web::Json<StkCallbackEnvelope>,
) -> ServiceResult<HttpResponse> {
    data.payment_service()
        .handle_callback(&reference, envelope.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

/// The caller's payment history
///
/// GET /api/v1/payments?page=&limit=&status=
///
/// Requires an access token
/// Response: PaymentListResponse
pub async fn list_payments(
    data: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<PaymentListQuery>,
) -> ServiceResult<HttpResponse> {
    let response = data
        .payment_service()
        .list_payments(user.id, query.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use chrono::Duration;
    use serde_json::{json, Value};
    use uuid::Uuid;
    use crate::utils::{generate_hmac_signature, issue_access_token};

    fn token_for(state: &AppState) -> String {
        issue_access_token(
            Uuid::new_v4(),
            "user",
            &state.config.security.access_token_secret,
            Duration::hours(1),
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn test_initiate_requires_access_token() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new_for_test()))
                .route("/initiate-stkpush", web::post().to(initiate_stk_push)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/initiate-stkpush")
            .set_json(json!({ "phoneNumber": "0712345678", "amount": 100, "courses": [] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Please login to access this resource");
    }

    #[actix_web::test]
    async fn test_initiate_rejects_invalid_phone() {
        let state = AppState::new_for_test();
        let token = token_for(&state);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/initiate-stkpush", web::post().to(initiate_stk_push)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/initiate-stkpush")
            .insert_header(("access-token", token))
            .set_json(json!({
                "phoneNumber": "0812345678",
                "amount": "1500.50",
                "courses": [Uuid::new_v4()]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 400);
        assert_eq!(body["message"], "Please enter a valid Kenyan phone number");
    }

    #[actix_web::test]
    async fn test_callback_with_bad_signature_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new_for_test()))
                .route("/callback", web::post().to(mpesa_callback)),
        )
        .await;

        let payment_ref = Uuid::new_v4();
        let forged = generate_hmac_signature(&payment_ref.to_string(), "not-the-callback-secret").unwrap();
        let body = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully."
                }
            }
        });

        let req = test::TestRequest::post()
            .uri(&format!("/callback?ref={}&sig={}", payment_ref, forged))
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/callback")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_signed_callback_without_stk_body_is_bad_request() {
        let state = AppState::new_for_test();
        let payment_ref = Uuid::new_v4().to_string();
        let sig = generate_hmac_signature(&payment_ref, &state.config.security.callback_secret).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/callback", web::post().to(mpesa_callback)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/callback?ref={}&sig={}", payment_ref, sig))
            .set_json(json!({ "Body": {} }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
