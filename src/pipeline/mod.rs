//! 单轮处理流水线：安全分类、警告升级、生成适配、工具调用循环、质检、带反馈重生成、提示词、过程事件

pub mod escalation;
pub mod evaluator;
pub mod events;
pub mod generation;
pub mod prompts;
pub mod retry;
pub mod safety;
pub mod tool_loop;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::core::TurnError;

pub use escalation::{escalate, Escalation, EscalationPolicy, SAFETY_ALERT_TEXT};
pub use evaluator::{EvaluationVerdict, Evaluator, EvaluatorError, LlmEvaluator};
pub use events::TurnEvent;
pub use generation::{
    parse_tool_calls, GenerationEngine, GenerationError, GenerationOutcome, GenerationRequest,
    LlmGenerationEngine,
};
pub use retry::RetryCoordinator;
pub use safety::{
    ClassifierError, LlmSafetyClassifier, PatternSafetyClassifier, SafetyClassifier, SafetyVerdict,
    DEFAULT_OFFENSIVE_PATTERNS,
};
pub use tool_loop::ToolLoop;

/// 挂起点：取消令牌触发时放弃当前外部调用并返回 Cancelled
pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, TurnError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TurnError::Cancelled),
        out = fut => Ok(out),
    }
}
