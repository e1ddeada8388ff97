//! 错误恢复引擎
//!
//! 根据 GenerationError 返回 RecoveryAction，供工具调用循环决定是注入纠正提示重试还是终止本轮。

use crate::core::RecoveryAction;
use crate::pipeline::GenerationError;

/// 将生成错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &GenerationError) -> RecoveryAction {
        match err {
            GenerationError::MalformedToolCall(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous output looked like a tool call but was not valid JSON: {raw}. \
                 To call a tool, output ONLY a JSON object of the form \
                 {{\"tool_calls\": [{{\"id\": \"call_1\", \"tool\": \"<name>\", \"args\": {{...}}}}]}}. \
                 Otherwise answer the user in plain text."
            )),
            GenerationError::Llm(_) => RecoveryAction::Abort,
        }
    }
}
