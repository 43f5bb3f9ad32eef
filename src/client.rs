// Checkout client
// What the mobile checkout screen does: start an STK push, then poll
// /verify-payment with exponential backoff until the payment settles

use std::time::Duration;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;
use crate::models::{
    InitiatePaymentRequest, InitiatePaymentResponse, PaymentStatus, VerifyPaymentRequest,
    VerifyPaymentResponse, PROCESSING_ERROR_CODE,
};
use crate::utils::ACCESS_TOKEN_HEADER;

pub const TIMEOUT_MESSAGE: &str = "Payment verification timeout. Please check your M-Pesa messages.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Server {
        status: u16,
        message: String,
        error_code: Option<String>,
    },
}

/// How a polled payment ended
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Completed { order_id: Option<Uuid> },
    Failed { message: String, error_code: Option<String> },
    TimedOut,
}

impl PaymentOutcome {
    /// Text shown to the customer
    pub fn message(&self) -> &str {
        match self {
            PaymentOutcome::Completed { .. } => "Payment verified successfully",
            PaymentOutcome::Failed { message, .. } => message,
            PaymentOutcome::TimedOut => TIMEOUT_MESSAGE,
        }
    }
}

/// Doubling delay schedule between verification attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max_retries: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(3),
            max_retries: 10,
        }
    }
}

impl Backoff {
    /// Delay before attempt `attempt + 1`
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.initial.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(move |attempt| self.delay(attempt))
    }
}

/// Envelope fields the client reads
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: String,
    data: Option<T>,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

enum Attempt {
    Settled(PaymentOutcome),
    Processing,
}

pub struct CheckoutClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    backoff: Backoff,
}

impl CheckoutClient {
    /// # Arguments
    /// * `base_url` - server root, e.g. `https://api.bookie.example`
    /// * `access_token` - the signed-in user's token
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            backoff: Backoff::default(),
        })
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    /// Ask the server to send the STK prompt
    pub async fn initiate_stk_push(
        &self,
        phone_number: &str,
        amount: Decimal,
        courses: Vec<Uuid>,
    ) -> Result<InitiatePaymentResponse, ClientError> {
        let request = InitiatePaymentRequest {
            phone_number: phone_number.to_string(),
            amount,
            courses,
        };

        let response = self
            .http
            .post(self.url("initiate-stkpush"))
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let envelope: Envelope<InitiatePaymentResponse> = response.json().await?;

        match envelope.data {
            Some(data) if status.is_success() => Ok(data),
            _ => Err(ClientError::Server {
                status: status.as_u16(),
                message: envelope.message,
                error_code: envelope.error_code,
            }),
        }
    }

    /// Poll until the payment completes, fails or the retries run out
    ///
    /// Errors other than a payment failure or a processing answer end the
    /// polling immediately.
    pub async fn await_payment(
        &self,
        merchant_request_id: &str,
        checkout_request_id: &str,
    ) -> Result<PaymentOutcome, ClientError> {
        let request = VerifyPaymentRequest {
            merchant_request_id: merchant_request_id.to_string(),
            checkout_request_id: checkout_request_id.to_string(),
        };

        let mut delays = self.backoff.delays().peekable();
        while let Some(delay) = delays.next() {
            match self.verify_once(&request).await? {
                Attempt::Settled(outcome) => return Ok(outcome),
                Attempt::Processing => {
                    if delays.peek().is_none() {
                        break;
                    }
                    log::debug!(
                        "Payment {} still processing, retrying in {:?}",
                        checkout_request_id,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Ok(PaymentOutcome::TimedOut)
    }

    async fn verify_once(&self, request: &VerifyPaymentRequest) -> Result<Attempt, ClientError> {
        let response = self
            .http
            .post(self.url("verify-payment"))
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let envelope: Envelope<VerifyPaymentResponse> = response.json().await?;

        if envelope.error_code.as_deref() == Some(PROCESSING_ERROR_CODE) {
            return Ok(Attempt::Processing);
        }

        match status {
            StatusCode::OK | StatusCode::ACCEPTED => match envelope.data {
                Some(data) if data.payment_status == PaymentStatus::Completed => {
                    Ok(Attempt::Settled(PaymentOutcome::Completed { order_id: data.order_id }))
                }
                Some(_) => Ok(Attempt::Processing),
                None => Err(ClientError::Server {
                    status: status.as_u16(),
                    message: "Missing verification data".to_string(),
                    error_code: None,
                }),
            },
            StatusCode::BAD_REQUEST if envelope.error_code.is_some() => {
                Ok(Attempt::Settled(PaymentOutcome::Failed {
                    message: envelope.message,
                    error_code: envelope.error_code,
                }))
            }
            _ => Err(ClientError::Server {
                status: status.as_u16(),
                message: envelope.message,
                error_code: envelope.error_code,
            }),
        }
    }
}
