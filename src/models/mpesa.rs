// Daraja (M-Pesa) wire types
// OAuth, STK push, STK query and the STK result callback

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::PaymentSettlement;

/// Daraja error code for "The transaction is being processed"
pub const PROCESSING_ERROR_CODE: &str = "500.001.1001";

/// Result code for a successful STK transaction
pub const RESULT_CODE_SUCCESS: &str = "0";

/// Daraja timestamps are East Africa Time
const EAT_OFFSET_SECS: i32 = 3 * 3600;

/// OAuth client-credentials response
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Error body returned by Daraja on non-2xx responses
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DarajaErrorResponse {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// STK push (Lipa na M-Pesa Online) request
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest<'a> {
    pub business_short_code: &'a str,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: &'a str,
    pub amount: i64,
    pub party_a: &'a str,
    pub party_b: &'a str,
    pub phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: &'a str,
    pub account_reference: &'a str,
    pub transaction_desc: &'a str,
}

/// STK push acknowledgement
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode", deserialize_with = "string_or_number")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

/// STK push status query request
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkQueryRequest<'a> {
    pub business_short_code: &'a str,
    pub password: String,
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: &'a str,
}

/// STK push status query response
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode", default, deserialize_with = "opt_string_or_number")]
    pub response_code: Option<String>,
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode", deserialize_with = "string_or_number")]
    pub result_code: String,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    /// Not part of the documented query body; some Daraja deployments include it
    #[serde(rename = "MpesaReceiptNumber", default)]
    pub mpesa_receipt_number: Option<String>,
}

/// Where an STK transaction ended up
#[derive(Debug, Clone, PartialEq)]
pub enum StkResult {
    Completed(PaymentSettlement),
    /// Customer has not answered yet
    Processing,
    Failed { code: String, description: String },
}

impl StkQueryResponse {
    /// Interpret the query result, stamping completion time with `now`
    pub fn into_result(self, now: DateTime<Utc>) -> StkResult {
        if self.result_code == RESULT_CODE_SUCCESS {
            StkResult::Completed(PaymentSettlement {
                mpesa_receipt_number: self.mpesa_receipt_number,
                transaction_date: now,
            })
        } else {
            StkResult::Failed {
                code: self.result_code,
                description: self.result_desc,
            }
        }
    }
}

/// Callback envelope: `{"Body":{"stkCallback":{...}}}`
#[derive(Debug, Deserialize, Serialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body", default)]
    pub body: Option<StkCallbackBody>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback", default)]
    pub stk_callback: Option<StkCallback>,
}

impl StkCallbackEnvelope {
    pub fn into_callback(self) -> Option<StkCallback> {
        self.body.and_then(|b| b.stk_callback)
    }
}

/// STK result as posted by Safaricom
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode", deserialize_with = "string_or_number")]
    pub result_code: String,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    /// Absent for e.g. `Balance`
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

impl CallbackMetadata {
    /// Fold the item list into a name -> value map; valueless items are dropped
    pub fn to_map(&self) -> HashMap<&str, &serde_json::Value> {
        self.items
            .iter()
            .filter_map(|item| item.value.as_ref().map(|v| (item.name.as_str(), v)))
            .collect()
    }
}

impl StkCallback {
    /// Interpret the callback; `now` is used when TransactionDate is missing or malformed
    pub fn result(&self, now: DateTime<Utc>) -> StkResult {
        if self.result_code != RESULT_CODE_SUCCESS {
            return StkResult::Failed {
                code: self.result_code.clone(),
                description: self.result_desc.clone(),
            };
        }

        let metadata = self.callback_metadata.clone().unwrap_or_default();
        let map = metadata.to_map();

        let mpesa_receipt_number = map
            .get("MpesaReceiptNumber")
            .map(|v| value_to_string(v));
        let transaction_date = map
            .get("TransactionDate")
            .and_then(|v| parse_transaction_date(&value_to_string(v)))
            .unwrap_or(now);

        StkResult::Completed(PaymentSettlement {
            mpesa_receipt_number,
            transaction_date,
        })
    }
}

/// Parse a Daraja `YYYYMMDDHHmmss` timestamp (EAT) into UTC
pub fn parse_transaction_date(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y%m%d%H%M%S").ok()?;
    let offset = FixedOffset::east_opt(EAT_OFFSET_SECS)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Daraja sends result codes as numbers in callbacks and as strings in query responses
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
