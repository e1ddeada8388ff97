//! 带反馈重生成（Retry Coordinator）
//!
//! 质检拒绝后只重生成一次：提示词携带被拒回复与拒绝原因，能力集合为空（不重复触发已发生的副作用），
//! 结果不再质检，直接作为本轮回复。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::TurnError;
use crate::memory::Message;
use crate::persona::PersonaContext;
use crate::pipeline::prompts::retry_instructions;
use crate::pipeline::{until_cancelled, GenerationEngine, GenerationOutcome, GenerationRequest};

pub struct RetryCoordinator {
    engine: Arc<dyn GenerationEngine>,
    persona: Arc<PersonaContext>,
}

impl RetryCoordinator {
    pub fn new(engine: Arc<dyn GenerationEngine>, persona: Arc<PersonaContext>) -> Self {
        Self { engine, persona }
    }

    pub async fn retry(
        &self,
        reply: &str,
        message: &str,
        history: &[Message],
        feedback: &str,
        cancel: &CancellationToken,
    ) -> Result<String, TurnError> {
        let instructions = retry_instructions(&self.persona, reply, feedback);
        let request = GenerationRequest {
            instructions: &instructions,
            history,
            message,
            transcript: &[],
            capabilities: &[],
            round: 0,
        };
        match until_cancelled(cancel, self.engine.generate(request)).await?? {
            GenerationOutcome::FinalText(text) => Ok(text),
            GenerationOutcome::ToolRequest(calls) => {
                tracing::error!(calls = calls.len(), "retry generation requested capabilities while disabled");
                Err(TurnError::UnexpectedToolRequest)
            }
        }
    }
}
