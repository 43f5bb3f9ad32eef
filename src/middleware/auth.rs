// Access-token authentication
// Resolves the calling user from the `access-token` header

use actix_web::{dev::Payload, web, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{ready, Ready};
use crate::error::ServiceError;
use crate::models::AuthenticatedUser;
use crate::state::AppState;
use crate::utils::{extract_access_token, verify_access_token};

const LOGIN_REQUIRED: &str = "Please login to access this resource";

impl FromRequest for AuthenticatedUser {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = authenticate(req);
        if let Ok(user) = &result {
            // Picked up by the request logger
            req.extensions_mut().insert(user.clone());
        }
        ready(result)
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, ServiceError> {
    let token = extract_access_token(req)
        .ok_or_else(|| ServiceError::Unauthorized(LOGIN_REQUIRED.to_string()))?;

    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("application state missing")))?;

    verify_access_token(&token, &state.config.security.access_token_secret).map_err(|e| {
        log::debug!("Rejected access token: {:#}", e);
        ServiceError::Unauthorized(LOGIN_REQUIRED.to_string())
    })
}

/// Fail with 403 unless the user holds `role`
pub fn require_role(user: &AuthenticatedUser, role: &str) -> Result<(), ServiceError> {
    if user.has_role(role) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Role: {} is not allowed to access this resource",
            user.role
        )))
    }
}
