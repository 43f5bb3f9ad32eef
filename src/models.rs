// Bookie data models
// Payments, orders, Daraja wire types and the authenticated user

mod mpesa;
mod order;
mod payment;
mod user;

pub use mpesa::*;
pub use order::*;
pub use payment::*;
pub use user::*;

use serde::Serialize;

/// Standard API response envelope
///
/// The mobile client branches on `success` and reads `data`, `message` and,
/// for failed verifications, `errorCode`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    /// Mirrors the HTTP status code
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying data
    pub fn success(data: T) -> Self {
        Self::success_with_message(data, "Success")
    }

    /// Successful response with a custom message
    pub fn success_with_message(data: T, message: &str) -> Self {
        Self {
            success: true,
            code: 200,
            message: message.to_string(),
            data: Some(data),
            error_code: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Error response
    pub fn error(code: u16, message: &str) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            code,
            message: message.to_string(),
            data: None,
            error_code: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Override the status code (e.g. 201 Created)
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    /// Attach a gateway/result error code
    pub fn with_error_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }
}

/// Pagination block for list responses
#[derive(Debug, Serialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationInfo {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = ((total as f64) / (limit as f64)).ceil() as u32;

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}
