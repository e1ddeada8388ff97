//! 回复质检（Evaluator）
//!
//! 在候选回复交给用户前做一次独立判定：{"is_acceptable": bool, "feedback": str}。
//! 与安全分类器相反，判定失败不会默认为通过，而是作为本轮错误上报，避免未质检的回复被当作已质检发出。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;
use crate::persona::PersonaContext;
use crate::pipeline::generation::extract_json_object;
use crate::pipeline::prompts::{evaluator_instructions, evaluator_request};

/// 质检结论；feedback 仅在不通过时有意义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationVerdict {
    pub acceptable: bool,
    pub feedback: String,
}

impl EvaluationVerdict {
    pub fn accept() -> Self {
        Self {
            acceptable: true,
            feedback: String::new(),
        }
    }

    pub fn reject(feedback: impl Into<String>) -> Self {
        Self {
            acceptable: false,
            feedback: feedback.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    #[error("evaluator unavailable: {0}")]
    Unavailable(#[from] LlmError),

    #[error("evaluator timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed evaluator output: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        reply: &str,
        message: &str,
        history: &[Message],
    ) -> Result<EvaluationVerdict, EvaluatorError>;
}

#[derive(Debug, Deserialize)]
struct Evaluation {
    is_acceptable: bool,
    #[serde(default)]
    feedback: String,
}

/// 解析评估输出；拒绝但没有给出反馈同样视为格式错误
pub fn parse_evaluation(output: &str) -> Result<EvaluationVerdict, EvaluatorError> {
    let json = extract_json_object(output).ok_or_else(|| EvaluatorError::Malformed(output.to_string()))?;
    let parsed: Evaluation = serde_json::from_str(json)
        .map_err(|e| EvaluatorError::Malformed(format!("{}: {}", e, json)))?;
    if parsed.is_acceptable {
        return Ok(EvaluationVerdict::accept());
    }
    if parsed.feedback.trim().is_empty() {
        return Err(EvaluatorError::Malformed("rejection without feedback".to_string()));
    }
    Ok(EvaluationVerdict::reject(parsed.feedback))
}

/// LLM 评估器：system 携带 persona 资料，user 携带历史、最新消息与候选回复
pub struct LlmEvaluator {
    llm: Arc<dyn LlmClient>,
    persona: Arc<PersonaContext>,
    timeout: Duration,
}

impl LlmEvaluator {
    pub fn new(llm: Arc<dyn LlmClient>, persona: Arc<PersonaContext>, timeout: Duration) -> Self {
        Self {
            llm,
            persona,
            timeout,
        }
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn evaluate(
        &self,
        reply: &str,
        message: &str,
        history: &[Message],
    ) -> Result<EvaluationVerdict, EvaluatorError> {
        let messages = vec![
            Message::system(evaluator_instructions(&self.persona)),
            Message::user(evaluator_request(reply, message, history)),
        ];
        let output = tokio::time::timeout(self.timeout, self.llm.complete(&messages))
            .await
            .map_err(|_| EvaluatorError::Timeout(self.timeout))??;
        parse_evaluation(&output)
    }
}
