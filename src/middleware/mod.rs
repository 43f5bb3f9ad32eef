// Middleware
// Access-token authentication, request logging and CORS

pub mod auth;
pub mod logging;
pub mod cors;

pub use auth::*;
pub use logging::*;
pub use cors::*;
