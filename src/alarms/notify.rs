// src/alarms/notify.rs
//
// Notification collaborator (spec.md §1: the outbound webhook HTTP call
// is out of core scope — this defines the narrow interface the Alarm
// Engine depends on, plus the one production implementation built on
// reqwest).

use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_batch(&self, body: &str) -> Result<(), String>;
}

/// Posts the batch body as plain text to a configured webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_batch(&self, body: &str) -> Result<(), String> {
        self.client
            .post(&self.url)
            .header("content-type", "text/plain")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Discards every batch. Used for tests and for sites that have not
/// configured a webhook URL.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send_batch(&self, _body: &str) -> Result<(), String> {
        Ok(())
    }
}
