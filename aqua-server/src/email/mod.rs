//! Outbound email
//!
//! Workflows hand finished messages to [`Notifier`], which sends them on a
//! spawned task; failures are logged and never reach the caller.

pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use tokio::sync::Mutex;

use crate::error::BoxError;

/// A rendered message
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), BoxError>;
}

pub struct SesMailer {
    client: SesClient,
    from: String,
}

impl SesMailer {
    pub fn new(client: SesClient, from: String) -> Self {
        Self { client, from }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), BoxError> {
        let subject = Content::builder().data(subject).charset("UTF-8").build()?;
        let body = Body::builder()
            .html(Content::builder().data(html_body).charset("UTF-8").build()?)
            .build();
        let message = Message::builder().subject(subject).body(body).build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await?;

        tracing::info!(to = to, "Email sent");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Logs messages instead of sending them and keeps an outbox
#[derive(Clone, Default)]
pub struct LogMailer {
    outbox: Arc<Mutex<Vec<SentMail>>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentMail> {
        self.outbox.lock().await.clone()
    }

    /// Wait (up to one second) until at least `count` messages were sent
    pub async fn wait_for(&self, count: usize) -> Vec<SentMail> {
        for _ in 0..100 {
            let sent = self.sent().await;
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.sent().await
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), BoxError> {
        tracing::info!(to = to, subject = subject, "Email (log mailer)");
        self.outbox.lock().await.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html_body.to_string(),
        });
        Ok(())
    }
}

/// Fire-and-forget email dispatch
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    pub fn notify(&self, to: impl Into<String>, email: Email) {
        let mailer = self.mailer.clone();
        let to = to.into();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, &email.subject, &email.html).await {
                tracing::warn!(to = %to, subject = %email.subject, error = %e, "Failed to send email");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), BoxError> {
            Err("smtp down".into())
        }
    }

    #[tokio::test]
    async fn test_notifier_delivers() {
        let mailer = LogMailer::new();
        let notifier = Notifier::new(Arc::new(mailer.clone()));
        notifier.notify(
            "a@b.vn",
            Email {
                subject: "Hi".into(),
                html: "<p>Hi</p>".into(),
            },
        );
        let sent = mailer.wait_for(1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.vn");
    }

    #[tokio::test]
    async fn test_notifier_swallows_failures() {
        let notifier = Notifier::new(Arc::new(FailingMailer));
        notifier.notify(
            "a@b.vn",
            Email {
                subject: "Hi".into(),
                html: String::new(),
            },
        );
        tokio::task::yield_now().await;
    }
}
