//! 单轮编排错误与恢复动作
//!
//! TurnError 是宿主唯一会看到的失败类型；被拦截（Blocked）的消息不是错误，而是正常回复。

use thiserror::Error;

use crate::pipeline::{EvaluatorError, GenerationError};

/// 本轮失败：宿主据此展示可重试的错误提示，而不是空回复
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("tool-call loop exceeded {max_rounds} rounds")]
    ToolRoundLimitExceeded { max_rounds: usize },

    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvaluatorError),

    /// 禁用工具的重生成仍请求了工具
    #[error("retry generation requested capabilities while they were disabled")]
    UnexpectedToolRequest,

    #[error("turn cancelled")]
    Cancelled,
}

/// 恢复引擎根据生成错误给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让 LLM 重试（如工具调用 JSON 格式错误）
    RetryWithPrompt(String),
    /// 终止当前轮
    Abort,
}
