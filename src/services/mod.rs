// Service layer
// Business logic behind the HTTP handlers

pub mod mail_service;
pub mod mpesa_service;
pub mod order_service;
pub mod payment_service;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use mail_service::Mailer;
pub use mpesa_service::MpesaService;
pub use order_service::OrderService;
pub use payment_service::{CallbackReference, PaymentService, VerifyOutcome};
