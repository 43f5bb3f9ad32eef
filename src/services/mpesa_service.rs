// M-Pesa gateway client
// Daraja OAuth, STK push and STK query over reqwest

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::MpesaConfig;
use crate::models::{
    AccessTokenResponse, DarajaErrorResponse, StkPushRequest, StkPushResponse, StkQueryRequest,
    StkQueryResponse, StkResult, PROCESSING_ERROR_CODE,
};
use crate::utils::{basic_auth_credentials, stk_password};

const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

/// Refresh tokens this long before Daraja says they expire
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Daraja tokens are valid for an hour when `expires_in` is missing
const DEFAULT_TOKEN_TTL_SECS: i64 = 3599;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway returned {status}: {}", .body.error_message.as_deref().unwrap_or("no error message"))]
    Api { status: u16, body: DarajaErrorResponse },
    #[error("gateway response could not be decoded: {0}")]
    Decode(String),
    #[error("gateway rejected the request ({code}): {description}")]
    Rejected { code: String, description: String },
}

impl GatewayError {
    /// Human readable message from the gateway, if it sent one
    pub fn gateway_message(&self) -> Option<&str> {
        match self {
            GatewayError::Api { body, .. } => body.error_message.as_deref(),
            GatewayError::Rejected { description, .. } => Some(description.as_str()),
            _ => None,
        }
    }

    /// Gateway error/response code, if any
    pub fn gateway_code(&self) -> Option<&str> {
        match self {
            GatewayError::Api { body, .. } => body.error_code.as_deref(),
            GatewayError::Rejected { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Daraja's "transaction is being processed" answer to a status query
    pub fn is_processing(&self) -> bool {
        self.gateway_code() == Some(PROCESSING_ERROR_CODE)
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Daraja client
pub struct MpesaService {
    client: Client,
    config: MpesaConfig,
    token: Mutex<Option<CachedToken>>,
}

impl MpesaService {
    /// Create a client for the configured Daraja environment
    pub fn new(config: MpesaConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(config.timeout))
            .user_agent(concat!("Bookie/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    /// OAuth access token, cached until shortly before expiry
    pub async fn access_token(&self) -> GatewayResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.token.clone());
            }
        }

        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );
        let credentials = basic_auth_credentials(&self.config.consumer_key, &self.config.consumer_secret);

        log::debug!("Requesting M-Pesa access token");
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Basic {}", credentials))
            .send()
            .await?;
        let body: AccessTokenResponse = read_response(response).await?;

        let ttl = body
            .expires_in
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let expires_at = Utc::now() + Duration::seconds((ttl - TOKEN_REFRESH_MARGIN_SECS).max(0));

        *cached = Some(CachedToken {
            token: body.access_token.clone(),
            expires_at,
        });

        Ok(body.access_token)
    }

    /// Send an STK push prompt to `phone_number`
    ///
    /// # Arguments
    /// * `phone_number` - normalized 254XXXXXXXXX
    /// * `amount` - whole shillings
    /// * `callback_url` - where Safaricom posts the result
    pub async fn stk_push(
        &self,
        phone_number: &str,
        amount: i64,
        callback_url: &str,
    ) -> GatewayResult<StkPushResponse> {
        let access_token = self.access_token().await?;
        let timestamp = timestamp_at(Utc::now());

        let request = StkPushRequest {
            business_short_code: &self.config.shortcode,
            password: stk_password(&self.config.shortcode, &self.config.passkey, &timestamp),
            timestamp,
            transaction_type: TRANSACTION_TYPE,
            amount,
            party_a: phone_number,
            party_b: &self.config.shortcode,
            phone_number,
            call_back_url: callback_url,
            account_reference: &self.config.account_reference,
            transaction_desc: &self.config.transaction_desc,
        };

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url);
        let response: StkPushResponse = self.post_json(&url, &access_token, &request).await?;

        if response.response_code != "0" {
            return Err(GatewayError::Rejected {
                code: response.response_code,
                description: response.response_description,
            });
        }

        log::info!(
            "STK push accepted: merchant_request_id={} checkout_request_id={}",
            response.merchant_request_id,
            response.checkout_request_id
        );
        Ok(response)
    }

    /// Ask Daraja where an STK push stands
    pub async fn stk_query(&self, checkout_request_id: &str) -> GatewayResult<StkResult> {
        let access_token = self.access_token().await?;
        let timestamp = timestamp_at(Utc::now());

        let request = StkQueryRequest {
            business_short_code: &self.config.shortcode,
            password: stk_password(&self.config.shortcode, &self.config.passkey, &timestamp),
            timestamp,
            checkout_request_id,
        };

        let url = format!("{}/mpesa/stkpushquery/v1/query", self.config.base_url);
        match self.post_json::<_, StkQueryResponse>(&url, &access_token, &request).await {
            Ok(response) => Ok(response.into_result(Utc::now())),
            Err(e) if e.is_processing() => {
                log::debug!("STK query {}: still processing", checkout_request_id);
                Ok(StkResult::Processing)
            }
            Err(e) => Err(e),
        }
    }

    async fn post_json<B, T>(&self, url: &str, access_token: &str, body: &B) -> GatewayResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        log::debug!("Daraja request: POST {}", url);
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await?;

        read_response(response).await
    }
}

/// Decode a success body, or the Daraja error body on failure
async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> GatewayResult<T> {
    let status = response.status();
    let text = response.text().await?;
    log::debug!("Daraja response {}: {}", status, text);

    if status.is_success() {
        return serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()));
    }

    let body = serde_json::from_str::<DarajaErrorResponse>(&text).unwrap_or_else(|_| {
        DarajaErrorResponse {
            error_message: Some(text.chars().take(200).collect()),
            ..Default::default()
        }
    });

    Err(GatewayError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Daraja timestamp (`YYYYMMDDHHmmss`, East Africa Time)
pub fn timestamp_at(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(3 * 3600) {
        Some(eat) => now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
        None => now.format("%Y%m%d%H%M%S").to_string(),
    }
}
