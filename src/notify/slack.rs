use eyre::Result;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::exec::audit::{BatchOutcome, BatchRecord};

/// Slack notifier
#[derive(Debug)]
pub struct SlackNotifier {
    /// The Slack OAuth token
    token: String,
    /// The HTTP client
    client: Client,
}

impl SlackNotifier {
    /// Create a new Slack notifier
    ///
    /// # Errors
    /// Returns an error if `SLACK_OAUTH_TOKEN` is unset or the HTTP client
    /// cannot be built.
    pub fn new() -> Result<Self> {
        let token = std::env::var("SLACK_OAUTH_TOKEN")
            .map_err(|_| eyre::eyre!("SLACK_OAUTH_TOKEN not set"))?;

        // Create a client with a timeout
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self { token, client })
    }

    /// Send a message to a specific channel
    ///
    /// # Errors
    /// Returns an error if the request fails or Slack reports an API error.
    pub async fn send_to(&self, msg: &str, channel: &str) -> Result<()> {
        let payload = json!({
            "channel": channel,
            "text": msg,
            "username": "Hopper Bot",
            "icon_emoji": ":rabbit:"
        });

        let response = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        // Check if Slack API returned success
        if !response["ok"].as_bool().unwrap_or(false) {
            return Err(eyre::eyre!(
                "Slack API error: {}",
                response["error"].as_str().unwrap_or("unknown error")
            ));
        }

        Ok(())
    }

    /// Send a message to the default channel
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn send(&self, msg: &str) -> Result<()> {
        self.send_to(msg, "#hopper").await
    }

    /// Send an error message to the error channel
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn send_error(&self, error: &str) -> Result<()> {
        self.send_to(&format!(":warning: Error: {error}"), "#hopper-errors")
            .await
    }

    /// Send a batch outcome to the channel that matches it: completions to
    /// the default channel, aborts to the error channel.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn send_batch_record(&self, record: &BatchRecord) -> Result<()> {
        match &record.outcome {
            BatchOutcome::Completed => {
                self.send(&format!(
                    ":moneybag: Batch {} completed: {} | expected {:.4}, realized {:.4}",
                    record.batch_id,
                    record.route.path.join(" -> "),
                    record.expected_profit,
                    record.realized_profit.unwrap_or(0.0),
                ))
                .await
            }
            BatchOutcome::Aborted { reason } => {
                self.send_error(&format!(
                    "Batch {} aborted: {} | {reason} | exposure {:.4}",
                    record.batch_id,
                    record.route.path.join(" -> "),
                    record.exposure,
                ))
                .await
            }
        }
    }
}
