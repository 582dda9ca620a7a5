//! Slack and Discord incoming-webhook delivery

use chrono::Utc;
use serde_json::json;
use std::time::Duration;

use super::NotifyError;
use crate::config::defaults::{NOTIFICATION_FOOTER, WEBHOOK_TIMEOUT_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Good,
    Warning,
    Danger,
}

impl Color {
    fn slack(self) -> &'static str {
        match self {
            Color::Good => "good",
            Color::Warning => "warning",
            Color::Danger => "danger",
        }
    }

    fn discord(self) -> u32 {
        match self {
            Color::Good => 0x00FF00,
            Color::Warning => 0xFFA500,
            Color::Danger => 0xFF0000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Slack,
    Discord,
}

#[derive(Clone)]
pub struct Webhook {
    http: reqwest::Client,
    url: String,
    flavor: Flavor,
}

impl Webhook {
    pub fn new(http: reqwest::Client, url: &str, flavor: Flavor) -> Self {
        Self {
            http,
            url: url.to_string(),
            flavor,
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn payload(&self, message: &str, color: Color) -> serde_json::Value {
        match self.flavor {
            Flavor::Slack => json!({
                "attachments": [{
                    "color": color.slack(),
                    "text": message,
                    "footer": NOTIFICATION_FOOTER,
                    "ts": Utc::now().timestamp(),
                }]
            }),
            Flavor::Discord => json!({
                "embeds": [{
                    "description": message,
                    "color": color.discord(),
                    "footer": { "text": NOTIFICATION_FOOTER },
                    "timestamp": Utc::now().to_rfc3339(),
                }]
            }),
        }
    }

    pub async fn send(&self, message: &str, color: Color) -> Result<(), NotifyError> {
        let resp = self
            .http
            .post(&self.url)
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .json(&self.payload(message, color))
            .send()
            .await?;
        let status = resp.status().as_u16();
        match (self.flavor, status) {
            (Flavor::Slack, 200) | (Flavor::Discord, 200 | 204) => Ok(()),
            _ => Err(NotifyError::Status(status)),
        }
    }
}
