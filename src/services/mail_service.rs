// Mail service
// Best-effort order confirmations; failures are logged, never returned to fulfilment

use chrono::{DateTime, Utc};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::stub::AsyncStubTransport;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use anyhow::{Context, Result};
use crate::config::MailConfig;

pub const ORDER_CONFIRMATION_SUBJECT: &str = "Order Confirmation";

/// Order confirmation contents
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub to_name: String,
    pub to_email: String,
    /// Short order reference shown to the customer
    pub order_ref: String,
    pub course_names: String,
    pub amount: i64,
    pub date: DateTime<Utc>,
}

impl OrderConfirmation {
    fn body(&self) -> String {
        format!(
            "Hello {},\n\n\
             Thank you for your purchase.\n\n\
             Order: #{}\n\
             Courses: {}\n\
             Amount: KES {}\n\
             Date: {}\n\n\
             You can start learning from your Bookie library right away.\n",
            self.to_name,
            self.order_ref,
            self.course_names,
            self.amount,
            self.date.format("%B %-d, %Y"),
        )
    }
}

enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    /// Accepts (or rejects) everything without sending; used in tests
    Stub(AsyncStubTransport),
    Disabled,
}

/// Outgoing mail
pub struct Mailer {
    transport: Transport,
    from: Option<Mailbox>,
}

impl Mailer {
    /// SMTP mailer from configuration, or a disabled one without `SMTP_HOST`
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let host = match config.smtp_host.as_deref() {
            Some(host) if config.enabled() => host,
            _ => {
                log::info!("SMTP_HOST not set, order confirmation mail disabled");
                return Ok(Self::disabled());
            }
        };

        let from: Mailbox = config
            .smtp_mail
            .parse()
            .context("SMTP_MAIL is not a valid address")?;

        let builder = if config.smtp_port == 587 {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        }
        .context("Failed to configure SMTP relay")?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_mail.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        Ok(Self {
            transport: Transport::Smtp(transport),
            from: Some(from),
        })
    }

    pub fn disabled() -> Self {
        Self {
            transport: Transport::Disabled,
            from: None,
        }
    }

    /// Mailer that never touches the network; `accept` picks the send result
    pub fn stub(from: Mailbox, accept: bool) -> Self {
        let stub = if accept {
            AsyncStubTransport::new_ok()
        } else {
            AsyncStubTransport::new_error()
        };

        Self {
            transport: Transport::Stub(stub),
            from: Some(from),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.transport, Transport::Disabled)
    }

    pub fn build_order_confirmation(&self, confirmation: &OrderConfirmation) -> Result<Message> {
        let from = self.from.clone().context("Mail sender is not configured")?;
        let to = Mailbox::new(
            Some(confirmation.to_name.clone()),
            confirmation
                .to_email
                .parse()
                .with_context(|| format!("Invalid recipient address {}", confirmation.to_email))?,
        );

        Message::builder()
            .from(from)
            .to(to)
            .subject(ORDER_CONFIRMATION_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(confirmation.body())
            .context("Failed to build order confirmation")
    }

    /// Send an order confirmation; returns whether it was handed to the transport
    pub async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let message = match self.build_order_confirmation(confirmation) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Order confirmation for {} not sent: {:#}", confirmation.order_ref, e);
                return false;
            }
        };

        let result = match &self.transport {
            Transport::Smtp(smtp) => smtp.send(message).await.map(|_| ()).map_err(|e| e.to_string()),
            Transport::Stub(stub) => stub.send(message).await.map(|_| ()).map_err(|e| e.to_string()),
            Transport::Disabled => return false,
        };

        match result {
            Ok(()) => {
                log::info!(
                    "Sent order confirmation #{} to {}",
                    confirmation.order_ref,
                    confirmation.to_email
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to send order confirmation #{}: {}", confirmation.order_ref, e);
                false
            }
        }
    }
}
