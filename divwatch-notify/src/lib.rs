//! Alert delivery channels.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use divwatch_config::{AlertChannel, AlertConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Rendered alert ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Delivery capability. An `Err` means the alert was not delivered.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn send_alert(&self, subject: &str, body: &str) -> Result<()>;

    async fn send(&self, message: &AlertMessage) -> Result<()> {
        self.send_alert(&message.subject, &message.body).await
    }
}

/// Writes alerts to the structured log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn send_alert(&self, subject: &str, body: &str) -> Result<()> {
        warn!(subject, body, "dividend alert");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
    /// Chat services such as Slack render this field.
    text: String,
}

/// Posts alerts as JSON to an HTTP endpoint.
pub struct WebhookDispatcher {
    client: Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build webhook client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertDispatcher for WebhookDispatcher {
    async fn send_alert(&self, subject: &str, body: &str) -> Result<()> {
        let payload = WebhookPayload {
            subject,
            body,
            text: format!("*{subject}*\n{body}"),
        };
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("webhook request failed")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("webhook responded with status {status}: {text}"));
        }
        Ok(())
    }
}

/// Build the dispatcher selected by the configuration.
pub fn build_dispatcher(config: &AlertConfig) -> Result<Arc<dyn AlertDispatcher>> {
    match config.channel {
        AlertChannel::Log => Ok(Arc::new(LogDispatcher)),
        AlertChannel::Webhook => {
            let url = config
                .webhook_url
                .as_deref()
                .ok_or_else(|| anyhow!("webhook channel selected without a webhook_url"))?;
            Ok(Arc::new(WebhookDispatcher::new(url)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_dispatcher_always_delivers() {
        let message = AlertMessage::new("Dividend Alert: KO", "body");
        assert!(LogDispatcher.send(&message).await.is_ok());
    }

    #[test]
    fn webhook_channel_without_url_is_rejected() {
        let config = AlertConfig {
            channel: AlertChannel::Webhook,
            webhook_url: None,
            subject_prefix: String::new(),
        };
        assert!(build_dispatcher(&config).is_err());
    }

    #[test]
    fn webhook_payload_carries_text_field() {
        let payload = WebhookPayload {
            subject: "Dividend Alert: KO",
            body: "up 25%",
            text: "*Dividend Alert: KO*\nup 25%".to_string(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["subject"], "Dividend Alert: KO");
        assert_eq!(value["text"], "*Dividend Alert: KO*\nup 25%");
    }
}
