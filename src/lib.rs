// Bookie course payments
// M-Pesa STK push checkout, verification and order fulfilment

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
