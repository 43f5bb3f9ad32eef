// Request logging middleware
// One line per request: client, method, path, latency, status, plus the
// authenticated user and callback payment ref when known

use actix_web::{
    dev::{ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use uuid::Uuid;
use crate::models::AuthenticatedUser;
use crate::services::CallbackReference;
use futures_util::future::{ok, Ready};
use std::task::{Context, Poll};
use std::pin::Pin;
use std::future::Future;
use std::time::Instant;

/// Request logging middleware
pub struct RequestLogging;

/// Callback `ref` query parameter; the signature is never logged
fn payment_ref(query_string: &str) -> Option<String> {
    web::Query::<CallbackReference>::from_query(query_string)
        .ok()
        .and_then(|query| query.into_inner().reference)
}

fn request_context(user: Option<Uuid>, payment_ref: Option<&str>) -> String {
    let mut context = String::new();
    if let Some(user) = user {
        context.push_str(&format!(" user={}", user));
    }
    if let Some(payment_ref) = payment_ref {
        context.push_str(&format!(" ref={}", payment_ref));
    }
    context
}

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: actix_web::dev::Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestLoggingMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequestLoggingMiddleware { service })
    }
}

pub struct RequestLoggingMiddleware<S> {
    service: S,
}

impl<S, B> actix_web::dev::Service<ServiceRequest> for RequestLoggingMiddleware<S>
where
    S: actix_web::dev::Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        // Path only: callback query strings carry signatures
        let path = req.path().to_string();
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let payment_ref = payment_ref(req.query_string());

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let elapsed = start_time.elapsed().as_millis();

            match &result {
                Ok(response) => {
                    let user = response
                        .request()
                        .extensions()
                        .get::<AuthenticatedUser>()
                        .map(|user| user.id);
                    let context = request_context(user, payment_ref.as_deref());
                    let status = response.status().as_u16();
                    if status >= 400 {
                        log::warn!("{} {} {}{} {}ms - {}", remote_addr, method, path, context, elapsed, status);
                    } else {
                        log::info!("{} {} {}{} {}ms - {}", remote_addr, method, path, context, elapsed, status);
                    }
                }
                Err(e) => {
                    let context = request_context(None, payment_ref.as_deref());
                    log::error!(
                        "{} {} {}{} {}ms - ERROR: {}",
                        remote_addr, method, path, context, elapsed, e
                    );
                }
            }

            result
        })
    }
}
