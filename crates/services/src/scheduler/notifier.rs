use async_trait::async_trait;

use super::ports::{ExpirationNotice, ExpirationNotifier};

/// Writes notices to the log only. Used when no chat delivery is configured.
pub struct LogNotifier;

#[async_trait]
impl ExpirationNotifier for LogNotifier {
    async fn notify(&self, notice: &ExpirationNotice) -> anyhow::Result<()> {
        tracing::info!(
            token = %notice.token,
            name = %notice.name,
            profile = %notice.profile,
            end = %notice.end,
            "Subscription expired"
        );
        Ok(())
    }
}

/// Sends notices to a chat through the bot HTTP API (`sendMessage`)
pub struct ChatBotNotifier {
    api_base_url: String,
    bot_token: String,
    chat_id: i64,
    http_client: reqwest::Client,
}

impl ChatBotNotifier {
    pub fn new(api_base_url: &str, bot_token: String, chat_id: i64) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ExpirationNotifier for ChatBotNotifier {
    async fn notify(&self, notice: &ExpirationNotice) -> anyhow::Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base_url, self.bot_token);

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": notice.message(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("sendMessage failed with status {}: {}", status, body);
        }

        tracing::debug!(
            "Expiration notice for token={} delivered to chat_id={}",
            notice.token,
            self.chat_id
        );
        Ok(())
    }
}
