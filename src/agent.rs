//! Headless 装配
//!
//! create_turn_components 按配置构建分类器、生成引擎、能力执行器、评估器与重生成协调器，
//! create_orchestrator 在此之上返回可多会话共享的 TurnOrchestrator。

use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, ClassifierKind};
use crate::core::{TurnComponents, TurnOrchestrator};
use crate::llm::create_llm_from_config;
use crate::notify::{LogNotifier, Notifier, PushoverNotifier};
use crate::persona::PersonaContext;
use crate::pipeline::prompts::persona_instructions;
use crate::pipeline::{
    EscalationPolicy, GenerationEngine, LlmEvaluator, LlmGenerationEngine, LlmSafetyClassifier,
    PatternSafetyClassifier, RetryCoordinator, SafetyClassifier, ToolLoop,
    DEFAULT_OFFENSIVE_PATTERNS,
};
use crate::tools::{capability_notify_timeout, default_registry, CapabilityExecutor};

/// 按 [notify] 选择通知通道；未配置 Pushover 凭据时退化为日志
pub fn create_notifier(cfg: &AppConfig) -> Arc<dyn Notifier> {
    if cfg.notify.provider.eq_ignore_ascii_case("pushover") {
        if let Some((token, user)) = cfg.notify.pushover_credentials() {
            tracing::info!("Using Pushover notifications");
            return Arc::new(PushoverNotifier::new(token, user));
        }
        tracing::warn!("Pushover credentials not set, notifications will only be logged");
    }
    Arc::new(LogNotifier)
}

pub fn create_turn_components(
    cfg: &AppConfig,
    persona: Arc<PersonaContext>,
) -> anyhow::Result<TurnComponents> {
    let request_timeout = Duration::from_secs(cfg.llm.timeouts.request);
    let notify_timeout = Duration::from_secs(cfg.notify.timeout_secs);
    let tool_timeout = Duration::from_secs(cfg.tools.tool_timeout_secs);

    let llm = create_llm_from_config(cfg, None);
    let judge = match cfg.llm.judge_model.as_deref() {
        Some(model) => create_llm_from_config(cfg, Some(model)),
        None => llm.clone(),
    };

    let notifier = create_notifier(cfg);
    let registry = default_registry(
        notifier.clone(),
        capability_notify_timeout(notify_timeout, tool_timeout),
    )?;
    tracing::info!(capabilities = ?registry.names(), "capability registry ready");
    let executor = Arc::new(CapabilityExecutor::new(registry, cfg.tools.tool_timeout_secs));

    let classifier: Arc<dyn SafetyClassifier> = match cfg.turn.classifier {
        ClassifierKind::Llm => Arc::new(LlmSafetyClassifier::new(judge.clone(), request_timeout)),
        ClassifierKind::Pattern => Arc::new(PatternSafetyClassifier::new(DEFAULT_OFFENSIVE_PATTERNS)?),
    };

    let engine: Arc<dyn GenerationEngine> = Arc::new(LlmGenerationEngine::new(llm, request_timeout));

    Ok(TurnComponents {
        classifier,
        policy: EscalationPolicy {
            notify_every_strike_past_threshold: cfg.turn.notify_every_strike_past_threshold,
        },
        notifier,
        notify_timeout,
        tool_loop: ToolLoop::new(engine.clone(), executor).with_max_rounds(cfg.turn.max_tool_rounds),
        evaluator: Arc::new(LlmEvaluator::new(judge, persona.clone(), request_timeout)),
        retry: RetryCoordinator::new(engine, persona.clone()),
        instructions: persona_instructions(&persona),
    })
}

pub fn create_orchestrator(
    cfg: &AppConfig,
    persona: Arc<PersonaContext>,
) -> anyhow::Result<TurnOrchestrator> {
    Ok(TurnOrchestrator::new(create_turn_components(cfg, persona)?))
}
