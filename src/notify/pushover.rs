//! Pushover 推送
//!
//! POST 表单（token / user / message）到 messages.json；非 2xx 视为失败。

use async_trait::async_trait;

use crate::notify::{Notifier, NotifyError};

pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

pub struct PushoverNotifier {
    client: reqwest::Client,
    token: String,
    user: String,
}

impl PushoverNotifier {
    pub fn new(token: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            user: user.into(),
        }
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let form = [
            ("token", self.token.as_str()),
            ("user", self.user.as_str()),
            ("message", text),
        ];
        let resp = self.client.post(PUSHOVER_API_URL).form(&form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Status { status, body });
        }
        tracing::debug!("Pushover notification delivered");
        Ok(())
    }
}
