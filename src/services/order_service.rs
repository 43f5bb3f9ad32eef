// Order service
// Turns completed payments into orders and grants the purchased courses

use std::sync::Arc;

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    AuthenticatedUser, Course, CreateOrderRequest, Fulfilment, Order, OrderResponse, Payment,
};
use crate::services::mail_service::{Mailer, OrderConfirmation};

const ORDER_COLUMNS: &str =
    "id, user_id, course_ids, payment_id, amount, status, created_at, updated_at";

/// Order service
pub struct OrderService {
    pool: PgPool,
    mailer: Arc<Mailer>,
}

impl OrderService {
    pub fn new(pool: PgPool, mailer: Arc<Mailer>) -> Self {
        Self { pool, mailer }
    }

    /// Create the order for a completed payment, at most once
    ///
    /// In one transaction: insert the order unless the payment already has
    /// one, add the paid courses to the user's library, bump each newly
    /// granted course's purchase count and leave the user a notification.
    pub async fn create_order_from_payment(&self, payment: &Payment) -> ServiceResult<Fulfilment> {
        if !payment.is_completed() {
            return Err(ServiceError::bad_request("Payment has not been completed"));
        }

        let mut tx = self.pool.begin().await?;

        let inserted: Option<Order> = sqlx::query_as(&format!(
            r#"
            INSERT INTO orders (id, user_id, course_ids, payment_id, amount, status)
            VALUES ($1, $2, $3, $4, $5, 'completed')
            ON CONFLICT (payment_id) DO NOTHING
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(payment.user_id)
        .bind(&payment.course_ids)
        .bind(payment.id)
        .bind(payment.amount)
        .fetch_optional(&mut *tx)
        .await?;

        let order = match inserted {
            Some(order) => order,
            None => {
                let existing = fetch_order_for_payment(&mut tx, payment.id)
                    .await?
                    .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!(
                        "order for payment {} conflicted but was not found",
                        payment.id
                    )))?;
                tx.commit().await?;
                return Ok(Fulfilment {
                    order: existing,
                    created: false,
                    granted_courses: Vec::new(),
                });
            }
        };

        let granted_courses = grant_courses(&mut tx, payment.user_id, &payment.course_ids).await?;

        if !granted_courses.is_empty() {
            sqlx::query("UPDATE courses SET purchased = purchased + 1 WHERE id = ANY($1)")
                .bind(&granted_courses)
                .execute(&mut *tx)
                .await?;
        }

        let course_names: Option<String> = sqlx::query_scalar(
            "SELECT string_agg(name, ', ' ORDER BY name) FROM courses WHERE id = ANY($1)",
        )
        .bind(&payment.course_ids)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, title, message)
            VALUES ($1, $2, 'New Order', $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment.user_id)
        .bind(order_notification_message(course_names.as_deref()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!(
            "Created order {} for payment {} ({} course(s) granted)",
            order.id,
            payment.id,
            granted_courses.len()
        );

        self.send_confirmation(&order, course_names.unwrap_or_default());

        Ok(Fulfilment {
            order,
            created: true,
            granted_courses,
        })
    }

    /// Order a single course against an already completed payment
    pub async fn create_order(
        &self,
        user: &AuthenticatedUser,
        request: CreateOrderRequest,
    ) -> ServiceResult<Fulfilment> {
        let course = self
            .get_course(request.course_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Course not found"))?;

        let (merchant_request_id, checkout_request_id) = request
            .payment_info
            .ids()
            .ok_or_else(|| ServiceError::bad_request("Invalid M-Pesa payment information"))?;

        let payment: Payment = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE merchant_request_id = $1 AND checkout_request_id = $2 AND user_id = $3",
            super::payment_service::PAYMENT_COLUMNS
        ))
        .bind(merchant_request_id)
        .bind(checkout_request_id)
        .bind(user.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Payment record not found"))?;

        // The verify/callback path may already have fulfilled this payment
        if let Some(order) = self.find_order_for_payment(payment.id).await? {
            if order.course_ids.contains(&course.id) {
                return Ok(Fulfilment {
                    order,
                    created: false,
                    granted_courses: Vec::new(),
                });
            }
        }

        if self.user_owns_course(user.id, course.id).await? {
            return Err(ServiceError::bad_request("You have already purchased this course"));
        }

        if !payment.is_completed() {
            return Err(ServiceError::bad_request("Payment has not been completed"));
        }

        if !payment.covers_course(course.id) {
            return Err(ServiceError::bad_request("Payment does not cover this course"));
        }

        self.create_order_from_payment(&payment).await
    }

    /// All orders, newest first
    pub async fn list_orders(&self) -> ServiceResult<Vec<OrderResponse>> {
        let orders: Vec<Order> = sqlx::query_as(&format!(
            "SELECT {} FROM orders ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(orders.iter().map(Order::to_response).collect())
    }

    pub async fn find_order_for_payment(&self, payment_id: Uuid) -> ServiceResult<Option<Order>> {
        let order = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE payment_id = $1",
            ORDER_COLUMNS
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Mail the customer in the background; a failed mail does not undo the order
    fn send_confirmation(&self, order: &Order, course_names: String) {
        if !self.mailer.is_enabled() {
            return;
        }

        let pool = self.pool.clone();
        let mailer = self.mailer.clone();
        let order = order.clone();

        tokio::spawn(async move {
            let recipient: Option<(String, String)> =
                match sqlx::query_as("SELECT name, email FROM users WHERE id = $1")
                    .bind(order.user_id)
                    .fetch_optional(&pool)
                    .await
                {
                    Ok(recipient) => recipient,
                    Err(e) => {
                        log::warn!("Order confirmation for {} skipped: {}", order.id, e);
                        return;
                    }
                };

            let Some((to_name, to_email)) = recipient else {
                log::warn!("Order confirmation for {} skipped: user {} not found", order.id, order.user_id);
                return;
            };

            let confirmation = OrderConfirmation {
                to_name,
                to_email,
                order_ref: order_reference(order.id),
                course_names,
                amount: order.amount,
                date: Utc::now(),
            };
            mailer.send_order_confirmation(&confirmation).await;
        });
    }

    async fn get_course(&self, course_id: Uuid) -> ServiceResult<Option<Course>> {
        let course = sqlx::query_as("SELECT id, name, price, purchased FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(course)
    }

    async fn user_owns_course(&self, user_id: Uuid, course_id: Uuid) -> ServiceResult<bool> {
        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_courses WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(owned)
    }
}

async fn fetch_order_for_payment(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {} FROM orders WHERE payment_id = $1",
        ORDER_COLUMNS
    ))
    .bind(payment_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Add courses to the user's library; returns only the ones not already owned
async fn grant_courses(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    course_ids: &[Uuid],
) -> Result<Vec<Uuid>, sqlx::Error> {
    if course_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_scalar(
        r#"
        INSERT INTO user_courses (user_id, course_id)
        SELECT $1, course_id FROM UNNEST($2::uuid[]) AS t(course_id)
        ON CONFLICT (user_id, course_id) DO NOTHING
        RETURNING course_id
        "#,
    )
    .bind(user_id)
    .bind(course_ids)
    .fetch_all(&mut **tx)
    .await
}

/// Short reference quoted in customer mail
fn order_reference(order_id: Uuid) -> String {
    order_id.simple().to_string().chars().take(6).collect()
}

fn order_notification_message(course_names: Option<&str>) -> String {
    match course_names {
        Some(names) if !names.is_empty() => format!("You have a new order from {}", names),
        _ => "You have a new order".to_string(),
    }
}
