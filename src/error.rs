// Service errors
// Maps business and infrastructure failures onto HTTP responses

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;
use crate::models::ApiResponse;
use crate::services::mpesa_service::GatewayError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    /// Customer-side payment failure (cancelled, insufficient funds, timeout)
    #[error("{message}")]
    PaymentFailed { code: Option<String>, message: String },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    /// Message safe to show to the client
    fn public_message(&self) -> String {
        match self {
            ServiceError::Gateway(e) => e
                .gateway_message()
                .unwrap_or("Payment gateway unavailable")
                .to_string(),
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BadRequest(_) | ServiceError::PaymentFailed { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Database(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        }

        let mut body = ApiResponse::<()>::error(status.as_u16(), &self.public_message());
        match self {
            ServiceError::PaymentFailed { code: Some(code), .. } => {
                body = body.with_error_code(code.clone());
            }
            ServiceError::Gateway(e) => {
                if let Some(code) = e.gateway_code() {
                    body = body.with_error_code(code);
                }
            }
            _ => {}
        }

        HttpResponse::build(status).json(body)
    }
}

/// Malformed JSON bodies answer with the usual envelope instead of plain text
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, req: &HttpRequest| {
        log::debug!("Rejected JSON body on {}: {}", req.path(), err);
        let message = match &err {
            JsonPayloadError::ContentType => "Expected a JSON body".to_string(),
            JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                "Request body too large".to_string()
            }
            other => format!("Invalid request body: {}", other),
        };
        ServiceError::bad_request(message).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, req: &HttpRequest| {
        log::debug!("Rejected query on {}: {}", req.path(), err);
        ServiceError::bad_request(format!("Invalid query string: {}", err)).into()
    })
}
