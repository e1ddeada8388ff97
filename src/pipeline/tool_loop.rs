//! 工具调用循环
//!
//! 生成 -> 若为 ToolRequest 则执行本轮全部调用并把占位 assistant 条目与结果写入内部扩展历史 -> 再生成，
//! 直到得到 FinalText。轮数有上限，超出即本轮失败；格式错误的调用注入纠正提示后重试，同样计入轮数。

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::{RecoveryAction, RecoveryEngine, TurnError};
use crate::memory::Message;
use crate::pipeline::events::send_event;
use crate::pipeline::{
    until_cancelled, GenerationEngine, GenerationOutcome, GenerationRequest, TurnEvent,
};
use crate::tools::{CapabilityExecutor, CapabilityInvocation, CapabilityResult};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

pub struct ToolLoop {
    engine: Arc<dyn GenerationEngine>,
    executor: Arc<CapabilityExecutor>,
    recovery: RecoveryEngine,
    max_rounds: usize,
}

impl ToolLoop {
    pub fn new(engine: Arc<dyn GenerationEngine>, executor: Arc<CapabilityExecutor>) -> Self {
        Self {
            engine,
            executor,
            recovery: RecoveryEngine::new(),
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// 驱动生成与能力执行直到得到最终文本；生成最多调用 max_rounds + 1 次
    pub async fn resolve(
        &self,
        instructions: &str,
        history: &[Message],
        message: &str,
        cancel: &CancellationToken,
        event_tx: Option<&UnboundedSender<TurnEvent>>,
    ) -> Result<String, TurnError> {
        let capabilities = self.executor.catalog();
        let mut transcript: Vec<Message> = Vec::new();
        let mut rounds = 0;

        loop {
            let request = GenerationRequest {
                instructions,
                history,
                message,
                transcript: &transcript,
                capabilities: &capabilities,
                round: rounds,
            };
            let outcome = until_cancelled(cancel, self.engine.generate(request)).await?;

            match outcome {
                Ok(GenerationOutcome::FinalText(text)) => {
                    tracing::debug!(rounds, "tool loop resolved");
                    return Ok(text);
                }
                Ok(GenerationOutcome::ToolRequest(invocations)) => {
                    self.check_bound(rounds)?;
                    rounds += 1;
                    tracing::info!(round = rounds, calls = invocations.len(), "executing capability round");
                    for inv in &invocations {
                        send_event(event_tx, TurnEvent::CapabilityCall {
                            id: inv.id.clone(),
                            name: inv.name.clone(),
                            args: inv.args.clone(),
                        });
                    }
                    let results = until_cancelled(cancel, self.executor.execute_round(&invocations)).await?;
                    for res in &results {
                        send_event(event_tx, TurnEvent::CapabilityResult {
                            id: res.id.clone(),
                            name: res.name.clone(),
                            ok: res.ok,
                        });
                    }
                    append_round(&mut transcript, &invocations, &results);
                }
                Err(e) => match self.recovery.handle(&e) {
                    RecoveryAction::RetryWithPrompt(prompt) => {
                        self.check_bound(rounds)?;
                        rounds += 1;
                        tracing::warn!(error = %e, round = rounds, "retrying generation after malformed tool call");
                        transcript.push(Message::user(prompt));
                    }
                    RecoveryAction::Abort => return Err(e.into()),
                },
            }
        }
    }

    fn check_bound(&self, rounds: usize) -> Result<(), TurnError> {
        if rounds >= self.max_rounds {
            tracing::error!(max_rounds = self.max_rounds, "tool-call loop exceeded round bound");
            return Err(TurnError::ToolRoundLimitExceeded {
                max_rounds: self.max_rounds,
            });
        }
        Ok(())
    }
}

/// 一条占位 assistant 条目（本轮请求的调用）+ 每个调用一条结果条目
fn append_round(
    transcript: &mut Vec<Message>,
    invocations: &[CapabilityInvocation],
    results: &[CapabilityResult],
) {
    transcript.push(Message::assistant(json!({ "tool_calls": invocations }).to_string()));
    for res in results {
        transcript.push(Message::tool(
            json!({ "id": res.id, "tool": res.name, "ok": res.ok, "result": res.output }).to_string(),
        ));
    }
}
