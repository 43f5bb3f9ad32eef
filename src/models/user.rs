// User-side models
// Authenticated caller, token claims and the course rows orders touch

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role granted to administrators
pub const ADMIN_ROLE: &str = "admin";

/// Access token claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Caller resolved from a verified access token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

/// Course fields needed for ordering
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    /// Whole shillings
    pub price: i64,
    pub purchased: i32,
}
