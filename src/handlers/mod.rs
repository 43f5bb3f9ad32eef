// HTTP handlers
// Thin adapters from requests to the service layer

pub mod payment_handlers;
pub mod order_handlers;
pub mod health_handlers;

pub use payment_handlers::*;
pub use order_handlers::*;
pub use health_handlers::*;
