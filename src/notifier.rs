//! Webhook notifications for status transitions

use async_trait::async_trait;
use chrono::TimeDelta;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, WatchError};
use crate::models::{Status, Target};

/// Body posted to the webhook (Discord-compatible).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub content: String,
}

impl Notification {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Deliver the notification, returning the HTTP status the endpoint answered with.
    async fn notify(&self, notification: &Notification) -> Result<u16>;
}

pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<u16> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| WatchError::Http(format!("POST {} failed: {}", self.url, e)))?;

        let status = response.status();
        if status.is_success() {
            info!("Webhook response: {}", status.as_u16());
        } else {
            // Delivery is best effort; the new state is already saved.
            warn!("Webhook response: {}", status.as_u16());
        }
        Ok(status.as_u16())
    }
}

/// Render a duration as `H:MM:SS`, dropping fractions of a second.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub fn compose_message(target: &Target, status: Status, offline_for: Option<TimeDelta>) -> String {
    match (status, offline_for) {
        (Status::Online, Some(elapsed)) => format!(
            "伺服器 {} 已上線, 距離上次離線時間: {}",
            target,
            format_elapsed(elapsed)
        ),
        (Status::Online, None) => format!("伺服器 {} 已上線", target),
        (Status::Offline, _) => format!("伺服器 {} 已離線", target),
    }
}
