// Utility functions
// Crypto, authentication and input validation helpers

pub mod crypto;
pub mod auth;
pub mod validation;

pub use crypto::*;
pub use auth::*;
pub use validation::*;
