//! 生成引擎适配层
//!
//! GenerationEngine 抽象「给定提示、历史、当前消息与能力目录，产出工具调用请求或最终文本」。
//! LlmGenerationEngine 在普通对话补全之上实现：能力目录与 JSON 调用协议拼入 system，
//! 以 JSON 开头的输出解析为 ToolRequest，其余为 FinalText。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;
use crate::pipeline::prompts::capability_section;
use crate::tools::{CapabilityInvocation, CapabilitySpec};

/// 生成失败：服务错误与工具调用格式错误分开，前者致命、后者可恢复
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("malformed tool call: {0}")]
    MalformedToolCall(String),
}

/// 单次生成的结果
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    ToolRequest(Vec<CapabilityInvocation>),
    FinalText(String),
}

/// 单次生成请求；`transcript` 是工具循环在当前消息之后追加的内部条目，`capabilities` 为空表示禁用工具
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub instructions: &'a str,
    pub history: &'a [Message],
    pub message: &'a str,
    pub transcript: &'a [Message],
    pub capabilities: &'a [CapabilitySpec],
    /// 当前工具轮次，用于为缺失 id 的调用分配确定性 id
    pub round: usize,
}

#[async_trait]
pub trait GenerationEngine: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<GenerationOutcome, GenerationError>;
}

/// 基于 LlmClient 的生成引擎；每次调用带超时
pub struct LlmGenerationEngine {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl LlmGenerationEngine {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }
}

#[async_trait]
impl GenerationEngine for LlmGenerationEngine {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<GenerationOutcome, GenerationError> {
        let system = format!(
            "{}{}",
            request.instructions,
            capability_section(request.capabilities)
        );
        let mut messages = Vec::with_capacity(request.history.len() + request.transcript.len() + 2);
        messages.push(Message::system(system));
        messages.extend_from_slice(request.history);
        messages.push(Message::user(request.message));
        messages.extend_from_slice(request.transcript);

        let output = tokio::time::timeout(self.timeout, self.llm.complete(&messages))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))??;

        if output.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        if request.capabilities.is_empty() {
            return Ok(GenerationOutcome::FinalText(output));
        }
        match parse_tool_calls(&output, request.round)? {
            Some(calls) => Ok(GenerationOutcome::ToolRequest(calls)),
            None => Ok(GenerationOutcome::FinalText(output)),
        }
    }
}

/// 取出输出中的 JSON 候选：```json 代码块或以 { / [ 开头的整段；普通文本返回 None
pub(crate) fn json_candidate(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(rest) = trimmed.strip_prefix("```json").or_else(|| trimmed.strip_prefix("```")) {
        let body = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest).trim();
        return (body.starts_with('{') || body.starts_with('[')).then_some(body);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed);
    }
    None
}

/// 从判定类输出中截取第一个 { 到最后一个 } 的 JSON
pub(crate) fn extract_json_object(output: &str) -> Option<&str> {
    let candidate = json_candidate(output).unwrap_or(output);
    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    (start <= end).then(|| &candidate[start..=end])
}

#[derive(Debug, Deserialize)]
struct RawCall {
    id: Option<String>,
    #[serde(alias = "name")]
    tool: String,
    #[serde(default, alias = "arguments")]
    args: Value,
}

fn is_call_like(item: &Value) -> bool {
    item.as_object()
        .is_some_and(|obj| obj.contains_key("tool") || obj.contains_key("name"))
}

/// 解析工具调用：
/// - `{"tool_calls": [...]}`、元素带 tool / name 的 `[...]` 或单个 `{"tool": ..., "args": ...}` 为调用请求
/// - 非 JSON 文本或不含调用标记的 JSON 为普通回复（None）
/// - 带有 "tool 标记却无法解析为 MalformedToolCall
pub fn parse_tool_calls(
    output: &str,
    round: usize,
) -> Result<Option<Vec<CapabilityInvocation>>, GenerationError> {
    let Some(candidate) = json_candidate(output) else {
        return Ok(None);
    };
    let malformed = |detail: String| GenerationError::MalformedToolCall(format!("{}: {}", detail, candidate));

    let value: Value = match serde_json::from_str(candidate) {
        Ok(v) => v,
        // 不含调用标记的非法 JSON（如 "[笑] ..."）按普通文本处理
        Err(_) if !candidate.contains("\"tool") => return Ok(None),
        Err(e) => return Err(malformed(e.to_string())),
    };
    let raw_calls = match value {
        Value::Array(items) if items.iter().any(is_call_like) => items,
        // 普通 JSON 数组（如 ["a", "b"]）是回复内容
        Value::Array(_) => return Ok(None),
        Value::Object(mut obj) => {
            if let Some(calls) = obj.remove("tool_calls") {
                match calls {
                    Value::Array(items) => items,
                    _ => return Err(malformed("tool_calls must be an array".to_string())),
                }
            } else if obj.contains_key("tool") || obj.contains_key("name") {
                vec![Value::Object(obj)]
            } else {
                return Ok(None);
            }
        }
        _ => return Ok(None),
    };
    if raw_calls.is_empty() {
        return Err(malformed("empty tool call list".to_string()));
    }

    raw_calls
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let call: RawCall = serde_json::from_value(raw).map_err(|e| malformed(e.to_string()))?;
            if call.tool.is_empty() {
                return Err(malformed("empty tool name".to_string()));
            }
            let args = if call.args.is_null() {
                Value::Object(Default::default())
            } else {
                call.args
            };
            Ok(CapabilityInvocation {
                id: call
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("call_{}_{}", round, index)),
                name: call.tool,
                args,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
