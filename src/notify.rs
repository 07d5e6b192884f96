use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ConfigError, NotifyConfig};

/// Booking lifecycle event pushed to the configured webhook. For room
/// bookings `seat_number` carries the slot number.
#[derive(Debug, Clone, Serialize)]
pub struct BookingEvent {
    pub event: &'static str,
    pub user_id: i64,
    pub resource_id: i64,
    pub seat_number: i32,
    pub date: String,
}

pub struct WebhookNotifier {
    client: Client,
    endpoint: Url,
}

impl WebhookNotifier {
    /// Returns `None` when no webhook is configured.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, ConfigError> {
        let Some(ref webhook_url) = config.webhook_url else {
            return Ok(None);
        };

        let endpoint = Url::parse(webhook_url).map_err(|e| {
            ConfigError::InvalidConfig(format!("notify.webhook_url is not a valid URL: {e}"))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                ConfigError::InvalidConfig(format!("failed to build webhook client: {e}"))
            })?;

        Ok(Some(Self { client, endpoint }))
    }

    /// Fire-and-forget: delivery failures are logged and never surface into
    /// the booking path.
    pub fn publish(&self, event: BookingEvent) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            match client.post(endpoint.as_str()).json(&event).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(event = event.event, "webhook delivered");
                }
                Ok(response) => {
                    warn!(event = event.event, status = %response.status(), "webhook rejected");
                }
                Err(e) => {
                    warn!(event = event.event, "webhook delivery failed: {e}");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_webhook_url_disables_notifier() {
        let config = NotifyConfig {
            webhook_url: None,
            timeout_ms: 1000,
        };
        assert!(WebhookNotifier::from_config(&config)
            .expect("config ok")
            .is_none());
    }

    #[test]
    fn invalid_webhook_url_is_rejected() {
        let config = NotifyConfig {
            webhook_url: Some("not a url".to_string()),
            timeout_ms: 1000,
        };
        assert!(WebhookNotifier::from_config(&config).is_err());
    }

    #[test]
    fn valid_webhook_url_builds_notifier() {
        let config = NotifyConfig {
            webhook_url: Some("https://hooks.example.org/deskbook".to_string()),
            timeout_ms: 1000,
        };
        assert!(WebhookNotifier::from_config(&config)
            .expect("config ok")
            .is_some());
    }
}
