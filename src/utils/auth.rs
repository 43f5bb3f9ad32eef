// Authentication helpers
// Access-token issue/verify and signed callback references

use actix_web::HttpRequest;
use uuid::Uuid;
use anyhow::{Result, Context};
use chrono::{Utc, Duration};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use crate::models::{AuthenticatedUser, Claims};
use crate::utils::crypto::{generate_hmac_signature, verify_hmac_signature};

/// Header the mobile client puts its token in
pub const ACCESS_TOKEN_HEADER: &str = "access-token";

/// Extract the access token from `access-token` or `Authorization: Bearer`
pub fn extract_access_token(req: &HttpRequest) -> Option<String> {
    if let Some(value) = req.headers().get(ACCESS_TOKEN_HEADER) {
        if let Ok(token) = value.to_str() {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Issue an HS256 access token
///
/// # Arguments
/// * `user_id` - token subject
/// * `role` - role claim checked by admin routes
/// * `secret` - signing key
/// * `ttl` - lifetime
pub fn issue_access_token(user_id: Uuid, role: &str, secret: &str, ttl: Duration) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .context("Failed to generate access token")
}

/// Verify an access token and resolve the caller
pub fn verify_access_token(token: &str, secret: &str) -> Result<AuthenticatedUser> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .context("Invalid access token")?;

    let id = Uuid::parse_str(&token_data.claims.sub)
        .context("Invalid user ID in token")?;

    Ok(AuthenticatedUser {
        id,
        role: token_data.claims.role,
    })
}

/// Callback URL for one payment: `{base}?ref=<id>&sig=<hmac(id)>`
pub fn signed_callback_url(base: &str, payment_id: Uuid, secret: &str) -> Result<String> {
    let reference = payment_id.to_string();
    let signature = generate_hmac_signature(&reference, secret)?;
    let separator = if base.contains('?') { '&' } else { '?' };

    Ok(format!("{}{}ref={}&sig={}", base, separator, reference, signature))
}

/// Check the `ref`/`sig` pair carried by a callback URL
pub fn verify_callback_reference(reference: &str, signature: &str, secret: &str) -> Result<bool> {
    verify_hmac_signature(reference, signature, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    const SECRET: &str = "test-access-token-secret-0123456789";

    #[test]
    fn test_access_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = issue_access_token(user_id, "user", SECRET, Duration::minutes(5)).unwrap();

        let user = verify_access_token(&token, SECRET).unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.role, "user");

        assert!(verify_access_token(&token, "another-secret-of-sufficient-length").is_err());
    }

    #[test]
    fn test_expired_access_token_rejected() {
        let token = issue_access_token(Uuid::new_v4(), "user", SECRET, Duration::hours(-2)).unwrap();
        assert!(verify_access_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_extract_access_token_headers() {
        let req = TestRequest::default()
            .insert_header((ACCESS_TOKEN_HEADER, "abc"))
            .to_http_request();
        assert_eq!(extract_access_token(&req).as_deref(), Some("abc"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer xyz"))
            .to_http_request();
        assert_eq!(extract_access_token(&req).as_deref(), Some("xyz"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic xyz"))
            .to_http_request();
        assert_eq!(extract_access_token(&req), None);
    }

    #[test]
    fn test_signed_callback_url() {
        let payment_id = Uuid::new_v4();
        let url = signed_callback_url("https://api.example.com/api/v1/callback", payment_id, "cb-secret").unwrap();
        assert!(url.starts_with(&format!("https://api.example.com/api/v1/callback?ref={}&sig=", payment_id)));

        let signature = url.rsplit("sig=").next().unwrap();
        assert!(verify_callback_reference(&payment_id.to_string(), signature, "cb-secret").unwrap());
        assert!(!verify_callback_reference(&Uuid::new_v4().to_string(), signature, "cb-secret").unwrap());

        let url = signed_callback_url("https://api.example.com/cb?x=1", payment_id, "cb-secret").unwrap();
        assert!(url.contains("?x=1&ref="));
    }
}
