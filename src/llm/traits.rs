//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Gemini / Mock）实现 LlmClient::complete（非流式）。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

/// LLM 边界错误：与「模型返回了空内容」区分开，由上层决定是否致命
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("model returned no content")]
    EmptyResponse,
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;
}
