// Crypto helpers
// HMAC signatures for callback references and Daraja credential encoding

use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{engine::general_purpose::STANDARD, Engine};
use anyhow::{Result, Context};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `message`, hex encoded
pub fn generate_hmac_signature(message: &str, secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .context("Invalid HMAC key")?;

    mac.update(message.as_bytes());
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Check a hex HMAC-SHA256 signature
pub fn verify_hmac_signature(message: &str, signature: &str, secret: &str) -> Result<bool> {
    let expected_signature = generate_hmac_signature(message, secret)?;
    Ok(constant_time_eq(&expected_signature, signature))
}

/// Constant-time string comparison
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a ^ byte_b;
    }

    result == 0
}

/// `Basic` credentials for the Daraja OAuth endpoint
pub fn basic_auth_credentials(consumer_key: &str, consumer_secret: &str) -> String {
    STANDARD.encode(format!("{}:{}", consumer_key, consumer_secret))
}

/// STK password: base64(shortcode + passkey + timestamp)
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_signature() {
        let message = "8d7e3c1a-2b4f-4c55-9a1e-0f6d2c3b4a59";
        let secret = "callback secret";

        let signature = generate_hmac_signature(message, secret).unwrap();
        assert_eq!(signature.len(), 64);

        assert!(verify_hmac_signature(message, &signature, secret).unwrap());
        assert!(!verify_hmac_signature(message, "invalid_signature", secret).unwrap());
        assert!(!verify_hmac_signature("other", &signature, secret).unwrap());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(!constant_time_eq("hello", "world"));
        assert!(!constant_time_eq("hello", "hello world"));
    }

    #[test]
    fn test_basic_auth_credentials() {
        assert_eq!(basic_auth_credentials("key", "secret"), "a2V5OnNlY3JldA==");
    }

    #[test]
    fn test_stk_password() {
        let password = stk_password("174379", "passkey", "20240101120000");
        let decoded = STANDARD.decode(password).unwrap();
        assert_eq!(decoded, b"174379passkey20240101120000");
    }
}
