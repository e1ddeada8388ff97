//! 外部通知通道：Notifier trait、Pushover 实现、仅日志实现与尽力投递
//!
//! 通知是 fire-and-forget：投递失败只记日志，从不让工具调用或本轮失败。

pub mod pushover;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use pushover::PushoverNotifier;

/// 通知投递错误
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("notification channel not configured")]
    NotConfigured,

    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
}

/// 通知通道 trait
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

/// 仅写日志（未配置推送凭据时使用）
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        tracing::info!(notification = %text, "notify");
        Ok(())
    }
}

/// 记录所有通知文本（测试与回放用）
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(text.to_string());
        }
        Ok(())
    }
}

/// 尽力投递：带超时等待，失败与超时只记 warn，返回是否送达
pub async fn dispatch_best_effort(
    notifier: &Arc<dyn Notifier>,
    text: &str,
    timeout: Duration,
) -> bool {
    match tokio::time::timeout(timeout, notifier.notify(text)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "notification delivery failed");
            false
        }
        Err(_) => {
            tracing::warn!(error = %NotifyError::Timeout(timeout), "notification delivery failed");
            false
        }
    }
}
