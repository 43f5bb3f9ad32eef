// Shared fixtures for service tests that run against Postgres

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;
use crate::config::Config;
use crate::models::{Payment, PaymentStatus};
use crate::services::mail_service::Mailer;
use crate::services::payment_service::PAYMENT_COLUMNS;
use crate::services::{MpesaService, OrderService, PaymentService};

pub const CALLBACK_SECRET: &str = "callback-secret-for-tests";

pub fn stub_mailer() -> Arc<Mailer> {
    Arc::new(Mailer::stub("Bookie <orders@bookie.example>".parse().unwrap(), true))
}

/// Daraja is unreachable: tests using this must not need the gateway
pub fn offline_mpesa() -> Arc<MpesaService> {
    let mut config = Config::default().mpesa;
    config.base_url = "http://127.0.0.1:1".to_string();
    config.timeout = 1;
    Arc::new(MpesaService::new(config).unwrap())
}

pub fn payment_service(pool: &PgPool) -> PaymentService {
    PaymentService::new(pool.clone(), offline_mpesa(), stub_mailer(), CALLBACK_SECRET.to_string())
}

pub fn order_service(pool: &PgPool) -> OrderService {
    OrderService::new(pool.clone(), stub_mailer())
}

pub async fn insert_user(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email) VALUES ($1, $2, $3)")
        .bind(id)
        .bind("Wanjiku")
        .bind(format!("{}@example.com", id.simple()))
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn insert_course(pool: &PgPool, name: &str, price: i64) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO courses (id, name, price) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(name)
        .bind(price)
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn grant_existing(pool: &PgPool, user_id: Uuid, course_id: Uuid) {
    sqlx::query("INSERT INTO user_courses (user_id, course_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn insert_payment(
    pool: &PgPool,
    user_id: Uuid,
    course_ids: &[Uuid],
    amount: i64,
    status: PaymentStatus,
) -> Payment {
    let id = Uuid::new_v4();
    sqlx::query_as(&format!(
        r#"
        INSERT INTO payments (
            id, merchant_request_id, checkout_request_id, user_id,
            amount, phone_number, course_ids, status
        )
        VALUES ($1, $2, $3, $4, $5, '254712345678', $6, $7)
        RETURNING {}
        "#,
        PAYMENT_COLUMNS
    ))
    .bind(id)
    .bind(format!("29115-{}", id.simple()))
    .bind(format!("ws_CO_{}", id.simple()))
    .bind(user_id)
    .bind(amount)
    .bind(course_ids)
    .bind(status.as_str())
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn fetch_payment(pool: &PgPool, payment_id: Uuid) -> Payment {
    sqlx::query_as(&format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS))
        .bind(payment_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn purchased_count(pool: &PgPool, course_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT purchased FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn order_count(pool: &PgPool, payment_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE payment_id = $1")
        .bind(payment_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
