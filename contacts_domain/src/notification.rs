//! Asynchronous delivery of confirmation emails.
//!
//! The gateway only enqueues. A background worker issues the email token,
//! renders the message and hands it to a [`MailSender`], retrying failed
//! deliveries with exponential backoff. When the worker falls behind the
//! bounded queue fills and further requests are refused with
//! [`MailError::QueueFull`].

use crate::token_service::TokenService;
use async_trait::async_trait;
use rand::{thread_rng, Rng};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail queue is full")]
    QueueFull,

    #[error("Mail queue is closed")]
    QueueClosed,

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Fire-and-forget dispatch of user notifications
pub trait NotificationDispatcher: Send + Sync {
    fn enqueue_confirmation_email(
        &self,
        to: &str,
        username: &str,
        base_url: &str,
    ) -> Result<(), MailError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub to: String,
    pub username: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Sender that writes mail to the log instead of an SMTP relay
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        info!(to = %mail.to, subject = %mail.subject, "{}", mail.body);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MailQueueConfig {
    pub capacity: usize,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for MailQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

/// Link the user follows to confirm their address
pub fn confirmation_link(base_url: &str, token: &str) -> String {
    format!("{}/auth/confirmed_email/{}", base_url.trim_end_matches('/'), token)
}

fn render_confirmation(request: &ConfirmationRequest, token: &str) -> OutgoingMail {
    OutgoingMail {
        to: request.to.clone(),
        subject: "Confirm your email".to_string(),
        body: format!(
            "Hi {},\n\nPlease confirm your email address by following this link:\n{}\n",
            request.username,
            confirmation_link(&request.base_url, token)
        ),
    }
}

pub struct MailQueue {
    sender: mpsc::Sender<ConfirmationRequest>,
}

impl MailQueue {
    /// Start the delivery worker. Mail is delivered one message at a time,
    /// so at most `capacity` requests wait behind the one in flight. The
    /// worker stops once every `MailQueue` handle is dropped and the queue
    /// is drained.
    pub fn spawn(
        token_service: Arc<dyn TokenService>,
        mailer: Arc<dyn MailSender>,
        config: MailQueueConfig,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<ConfirmationRequest>(config.capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                deliver(token_service.as_ref(), mailer.as_ref(), &config, request).await;
            }
            info!("Mail queue closed");
        });

        (Self { sender }, worker)
    }
}

impl NotificationDispatcher for MailQueue {
    fn enqueue_confirmation_email(
        &self,
        to: &str,
        username: &str,
        base_url: &str,
    ) -> Result<(), MailError> {
        let request = ConfirmationRequest {
            to: to.to_string(),
            username: username.to_string(),
            base_url: base_url.to_string(),
        };

        self.sender.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => MailError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => MailError::QueueClosed,
        })
    }
}

async fn deliver(
    token_service: &dyn TokenService,
    mailer: &dyn MailSender,
    config: &MailQueueConfig,
    request: ConfirmationRequest,
) {
    let token = match token_service.create_email_token(&request.to) {
        Ok(token) => token,
        Err(e) => {
            error!("Could not issue confirmation token for {}: {}", request.to, e);
            return;
        }
    };
    let mail = render_confirmation(&request, &token);

    let attempts = config.max_attempts.max(1);
    for attempt in 1..=attempts {
        match mailer.send(&mail).await {
            Ok(()) => {
                info!("Confirmation email sent to {}", mail.to);
                return;
            }
            Err(e) if attempt < attempts => {
                let backoff = backoff_delay(config.base_backoff, attempt);
                warn!(
                    "Delivery to {} failed (attempt {}/{}): {}; retrying in {:?}",
                    mail.to, attempt, attempts, e, backoff
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                error!("Giving up on email to {} after {} attempts: {}", mail.to, attempts, e);
            }
        }
    }
}

/// base * 2^(attempt-1), plus up to 10% jitter
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    let delay = base.saturating_mul(factor);
    let jitter_ms = (delay.as_millis() / 10) as u64;
    if jitter_ms == 0 {
        return delay;
    }
    delay + Duration::from_millis(thread_rng().gen_range(0..=jitter_ms))
}
