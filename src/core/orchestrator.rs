//! Turn Orchestrator：单轮状态机
//!
//! Start → Classifying → (Blocked | Resolving) → Evaluating → (Accepted | Retrying → Done)。
//! 会话状态（警告数、取消令牌）由 Session 持有并显式传入，编排器本身无跨会话可变状态，可被多会话共享。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;

use crate::core::{Reply, Session, TurnError, TurnPhase};
use crate::memory::Message;
use crate::notify::{dispatch_best_effort, Notifier};
use crate::pipeline::events::send_event;
use crate::pipeline::{
    until_cancelled, EscalationPolicy, Evaluator, RetryCoordinator, SafetyClassifier, ToolLoop,
    TurnEvent, SAFETY_ALERT_TEXT,
};

/// 编排器组件：可多会话共享
pub struct TurnComponents {
    pub classifier: Arc<dyn SafetyClassifier>,
    pub policy: EscalationPolicy,
    pub notifier: Arc<dyn Notifier>,
    pub notify_timeout: Duration,
    pub tool_loop: ToolLoop,
    pub evaluator: Arc<dyn Evaluator>,
    pub retry: RetryCoordinator,
    /// persona 主提示
    pub instructions: String,
}

pub struct TurnOrchestrator {
    components: TurnComponents,
    event_tx: Option<UnboundedSender<TurnEvent>>,
}

impl TurnOrchestrator {
    pub fn new(components: TurnComponents) -> Self {
        Self {
            components,
            event_tx: None,
        }
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: UnboundedSender<TurnEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn phase(&self, phase: TurnPhase) {
        tracing::debug!(?phase, terminal = phase.is_terminal(), "turn phase");
        send_event(self.event_tx.as_ref(), TurnEvent::PhaseChanged { phase });
    }

    /// 处理一轮用户输入；被拦截的消息作为正常回复返回，其余失败以 TurnError 返回且不产生部分回复
    pub async fn handle_turn(
        &self,
        session: &mut Session,
        message: &str,
        history: &[Message],
    ) -> Result<Reply, TurnError> {
        let span = tracing::info_span!("turn", session = %session.id(), strikes = session.strikes());
        let result = self.run(session, message, history).instrument(span).await;
        // 取消只作用于当前轮：下一轮换新令牌
        if session.is_cancelled() {
            session.renew_cancel_token();
        }
        if let Err(e) = &result {
            tracing::error!(session = %session.id(), error = %e, "turn failed");
            send_event(self.event_tx.as_ref(), TurnEvent::Error { text: e.to_string() });
        }
        result
    }

    async fn run(
        &self,
        session: &mut Session,
        message: &str,
        history: &[Message],
    ) -> Result<Reply, TurnError> {
        let c = &self.components;
        let cancel = session.cancel_token();
        self.phase(TurnPhase::Start);

        self.phase(TurnPhase::Classifying);
        let verdict = until_cancelled(&cancel, c.classifier.classify(message)).await?;
        let escalation = c.policy.escalate(session.strikes(), verdict);
        if verdict.is_offensive() {
            session.set_strikes(escalation.strikes);
            if escalation.notify {
                until_cancelled(
                    &cancel,
                    dispatch_best_effort(&c.notifier, SAFETY_ALERT_TEXT, c.notify_timeout),
                )
                .await?;
            }
            tracing::warn!(strikes = escalation.strikes, notified = escalation.notify, "offensive input");
            send_event(self.event_tx.as_ref(), TurnEvent::StrikeRecorded {
                strikes: escalation.strikes,
                notified: escalation.notify,
            });
        }
        if let Some(text) = escalation.message {
            self.phase(TurnPhase::Blocked);
            return Ok(Reply {
                text: text.to_string(),
                phase: TurnPhase::Blocked,
            });
        }

        self.phase(TurnPhase::Resolving);
        let candidate = c
            .tool_loop
            .resolve(&c.instructions, history, message, &cancel, self.event_tx.as_ref())
            .await?;

        self.phase(TurnPhase::Evaluating);
        let evaluation = until_cancelled(&cancel, c.evaluator.evaluate(&candidate, message, history)).await??;
        send_event(self.event_tx.as_ref(), TurnEvent::Evaluated {
            acceptable: evaluation.acceptable,
            feedback: evaluation.feedback.clone(),
        });

        if evaluation.acceptable {
            tracing::info!("reply accepted");
            self.phase(TurnPhase::Accepted);
            return Ok(Reply {
                text: candidate,
                phase: TurnPhase::Accepted,
            });
        }

        tracing::warn!(feedback = %evaluation.feedback, "reply rejected, regenerating once");
        self.phase(TurnPhase::Retrying);
        let text = c
            .retry
            .retry(&candidate, message, history, &evaluation.feedback, &cancel)
            .await?;
        self.phase(TurnPhase::Done);
        Ok(Reply {
            text,
            phase: TurnPhase::Done,
        })
    }
}
