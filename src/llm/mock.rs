//! Mock LLM 客户端（用于测试与无 API Key 的本地试跑）
//!
//! - MockLlmClient：回显最后一条 User 消息；遇到评估/安全判定请求时给出放行结果。
//! - ScriptedLlmClient：按脚本顺序返回预设结果，并记录每次收到的消息，供测试断言。
//! - DelayedLlmClient：固定延迟后才返回，用于验证各调用点的超时处理。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        if last_user.contains("is_acceptable") {
            return Ok(r#"{"is_acceptable": true, "feedback": ""}"#.to_string());
        }
        if last_user.contains("is_offensive") {
            return Ok(r#"{"is_offensive": false}"#.to_string());
        }
        Ok(format!("Echo from Mock: {}", last_user))
    }
}

/// 脚本客户端：依次弹出预设响应；脚本耗尽后返回 ApiError
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条错误响应
    pub fn then_error(self, err: LlmError) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(err));
        }
        self
    }

    /// 已收到的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 每次调用收到的完整消息列表
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| Err(LlmError::ApiError("script exhausted".to_string())))
    }
}

/// 延迟客户端：等待 delay 后返回固定内容
#[derive(Debug, Clone)]
pub struct DelayedLlmClient {
    delay: Duration,
    reply: String,
}

impl DelayedLlmClient {
    pub fn new(delay: Duration, reply: impl Into<String>) -> Self {
        Self {
            delay,
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl LlmClient for DelayedLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }
}
