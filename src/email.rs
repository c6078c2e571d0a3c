//! Outbound notification sink and delivery abstractions.
//!
//! The login flow never waits on email. One-time codes and security alerts
//! are handed to an [`EmailSender`] on a spawned task; a delivery failure is
//! logged and the triggering state transition proceeds unchanged, so a user
//! whose code never arrives can simply request a fresh one.
//!
//! The default sender for local dev is `LogEmailSender`, which logs and
//! returns `Ok(())`. Real deployments implement [`EmailSender`] against an
//! SMTP relay or delivery API.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Email delivery abstraction used by the notifier.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to be logged.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

/// Fire-and-forget dispatcher over an [`EmailSender`].
#[derive(Clone)]
pub struct Notifier {
    sender: Arc<dyn EmailSender>,
}

impl Notifier {
    #[must_use]
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }

    /// Send a one-time login code to the user's registered address.
    pub fn send_token(&self, to_email: &str, code: &str, display_name: &str) {
        let message = EmailMessage {
            to_email: to_email.to_string(),
            template: "mfa_token".to_string(),
            payload_json: json!({
                "code": code,
                "display_name": display_name,
            })
            .to_string(),
        };
        self.dispatch(message);
    }

    /// Send a security alert describing a notable account action.
    pub fn send_security_alert(&self, to_email: &str, action: &str, display_name: &str) {
        let message = EmailMessage {
            to_email: to_email.to_string(),
            template: "security_alert".to_string(),
            payload_json: json!({
                "action": action,
                "display_name": display_name,
            })
            .to_string(),
        };
        self.dispatch(message);
    }

    fn dispatch(&self, message: EmailMessage) {
        let sender = Arc::clone(&self.sender);
        tokio::spawn(async move {
            if let Err(err) = sender.send(&message) {
                error!(
                    to_email = %message.to_email,
                    template = %message.template,
                    "email delivery failed: {err}"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSender {
        sent: Mutex<Vec<EmailMessage>>,
    }

    impl EmailSender for RecordingSender {
        fn send(&self, message: &EmailMessage) -> Result<()> {
            self.sent
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .push(message.clone());
            Ok(())
        }
    }

    #[test]
    fn log_sender_accepts_messages() {
        let message = EmailMessage {
            to_email: "alice@example.com".to_string(),
            template: "mfa_token".to_string(),
            payload_json: "{}".to_string(),
        };
        assert!(LogEmailSender.send(&message).is_ok());
    }

    #[tokio::test]
    async fn send_token_builds_payload() -> Result<()> {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
        });
        let notifier = Notifier::new(sender.clone());
        notifier.send_token("alice@example.com", "123456", "Alice");

        // Dispatch happens on a spawned task; yield until it lands.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let sent = sender
            .sent
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?;
        let message = sent.first().ok_or_else(|| anyhow::anyhow!("no message"))?;
        assert_eq!(message.template, "mfa_token");
        let payload: serde_json::Value = serde_json::from_str(&message.payload_json)?;
        assert_eq!(payload["code"], "123456");
        assert_eq!(payload["display_name"], "Alice");
        Ok(())
    }
}
