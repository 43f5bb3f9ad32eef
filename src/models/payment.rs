// Payment model
// One row per STK push; status moves pending -> processing -> completed | failed

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Payment record
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Payment {
    pub id: Uuid,
    /// Daraja MerchantRequestID
    pub merchant_request_id: String,
    /// Daraja CheckoutRequestID (unique)
    pub checkout_request_id: String,
    pub user_id: Uuid,
    /// Whole shillings
    pub amount: i64,
    /// Normalized 254XXXXXXXXX
    pub phone_number: String,
    pub course_ids: Vec<Uuid>,
    pub status: PaymentStatus,
    pub mpesa_receipt_number: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// STK push sent, customer has not answered
    Pending,
    /// Gateway reports the transaction is still being processed
    Processing,
    Completed,
    Failed,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Completed and failed payments never change again
    pub fn is_final(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

impl Payment {
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    pub fn covers_course(&self, course_id: Uuid) -> bool {
        self.course_ids.contains(&course_id)
    }

    pub fn to_response(&self) -> PaymentResponse {
        PaymentResponse {
            payment_id: self.id,
            merchant_request_id: self.merchant_request_id.clone(),
            checkout_request_id: self.checkout_request_id.clone(),
            amount: self.amount,
            phone_number: self.phone_number.clone(),
            courses: self.course_ids.clone(),
            status: self.status,
            mpesa_receipt_number: self.mpesa_receipt_number.clone(),
            transaction_date: self.transaction_date,
            error_code: self.error_code.clone(),
            error_message: self.error_message.clone(),
            created_at: self.created_at,
        }
    }
}

/// Fields written when a payment settles successfully
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSettlement {
    pub mpesa_receipt_number: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

/// POST /initiate-stkpush body
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub phone_number: String,
    pub amount: Decimal,
    #[serde(default)]
    pub courses: Vec<Uuid>,
}

/// POST /initiate-stkpush response data
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InitiatePaymentResponse {
    #[serde(rename = "merchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "checkoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "paymentId")]
    pub payment_id: Uuid,
    #[serde(rename = "customerMessage", default)]
    pub customer_message: Option<String>,
}

/// POST /verify-payment body
///
/// The cart screen sends camelCase ids, the polling hook sends Daraja casing.
#[derive(Debug, Deserialize, Serialize)]
pub struct VerifyPaymentRequest {
    #[serde(rename = "merchantRequestID", alias = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "checkoutRequestID", alias = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

/// POST /verify-payment response data
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VerifyPaymentResponse {
    #[serde(rename = "orderId", default)]
    pub order_id: Option<Uuid>,
    #[serde(rename = "paymentStatus")]
    pub payment_status: PaymentStatus,
}

/// Payment as shown to its owner
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub payment_id: Uuid,
    #[serde(rename = "merchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "checkoutRequestID")]
    pub checkout_request_id: String,
    pub amount: i64,
    pub phone_number: String,
    pub courses: Vec<Uuid>,
    pub status: PaymentStatus,
    pub mpesa_receipt_number: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// GET /payments query
#[derive(Debug, Deserialize)]
pub struct PaymentListQuery {
    /// 1-based
    pub page: Option<u32>,
    /// Default 20, max 100
    pub limit: Option<u32>,
    pub status: Option<PaymentStatus>,
}

impl PaymentListQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Row offset; i64 so large pages cannot overflow
    pub fn offset(&self) -> i64 {
        (i64::from(self.page()) - 1) * i64::from(self.limit())
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(20).min(100).max(1)
    }
}

/// GET /payments response data
#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentResponse>,
    pub pagination: super::PaginationInfo,
}
