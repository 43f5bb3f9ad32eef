// Order model
// Created once per completed payment

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Order record
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_ids: Vec<Uuid>,
    /// Unique: at most one order per payment
    pub payment_id: Uuid,
    pub amount: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Completed
    }
}

/// Outcome of fulfilling a payment
#[derive(Debug, Clone)]
pub struct Fulfilment {
    pub order: Order,
    /// False when an order for the payment already existed
    pub created: bool,
    /// Courses newly added to the user's library
    pub granted_courses: Vec<Uuid>,
}

/// Daraja identifiers the client attaches to /create-order
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct PaymentInfo {
    #[serde(rename = "MerchantRequestID", alias = "merchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", alias = "checkoutRequestID", default)]
    pub checkout_request_id: Option<String>,
}

impl PaymentInfo {
    /// Both ids, if present and non-empty
    pub fn ids(&self) -> Option<(&str, &str)> {
        let merchant = self.merchant_request_id.as_deref().filter(|s| !s.is_empty())?;
        let checkout = self.checkout_request_id.as_deref().filter(|s| !s.is_empty())?;
        Some((merchant, checkout))
    }
}

/// POST /create-order body
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateOrderRequest {
    #[serde(rename = "courseId")]
    pub course_id: Uuid,
    #[serde(default)]
    pub payment_info: PaymentInfo,
}

/// Order as returned by the API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub courses: Vec<Uuid>,
    pub payment_id: Uuid,
    pub amount: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn to_response(&self) -> OrderResponse {
        OrderResponse {
            order_id: self.id,
            user_id: self.user_id,
            courses: self.course_ids.clone(),
            payment_id: self.payment_id,
            amount: self.amount,
            status: self.status,
            created_at: self.created_at,
        }
    }
}
