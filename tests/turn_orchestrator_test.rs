//! 单轮编排集成测试：用脚本化的生成引擎、评估器与记录型通知通道驱动完整状态机

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use persona::core::TurnComponents;
use persona::llm::{DelayedLlmClient, LlmClient, LlmError, MockLlmClient, ScriptedLlmClient};
use persona::memory::Message;
use persona::notify::{Notifier, NotifyError, RecordingNotifier};
use persona::persona::PersonaContext;
use persona::pipeline::escalation::{FIRST_STRIKE_MESSAGE, SECOND_STRIKE_MESSAGE, TERMINATION_MESSAGE};
use persona::pipeline::{
    EscalationPolicy, EvaluationVerdict, Evaluator, EvaluatorError, GenerationEngine,
    GenerationError, GenerationOutcome, GenerationRequest, LlmEvaluator, LlmGenerationEngine,
    LlmSafetyClassifier, PatternSafetyClassifier, RetryCoordinator, ToolLoop, TurnEvent,
    DEFAULT_OFFENSIVE_PATTERNS, SAFETY_ALERT_TEXT,
};
use persona::tools::{default_registry, CapabilityExecutor, CapabilityInvocation};
use persona::{Session, TurnError, TurnOrchestrator, TurnPhase};
use serde_json::json;

/// 生成请求快照
#[derive(Debug, Clone)]
struct SeenRequest {
    instructions: String,
    capability_count: usize,
    transcript_len: usize,
}

/// 脚本化生成引擎：按顺序返回预设结果并记录请求
#[derive(Default)]
struct ScriptedEngine {
    script: Mutex<VecDeque<Result<GenerationOutcome, GenerationError>>>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl ScriptedEngine {
    fn new(outcomes: Vec<Result<GenerationOutcome, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationEngine for ScriptedEngine {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<GenerationOutcome, GenerationError> {
        self.seen.lock().unwrap().push(SeenRequest {
            instructions: request.instructions.to_string(),
            capability_count: request.capabilities.len(),
            transcript_len: request.transcript.len(),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Llm(LlmError::ApiError("script exhausted".into()))))
    }
}

/// 脚本化评估器：记录调用次数
struct ScriptedEvaluator {
    verdicts: Mutex<VecDeque<Result<EvaluationVerdict, EvaluatorError>>>,
    calls: Mutex<usize>,
}

impl ScriptedEvaluator {
    fn new(verdicts: Vec<Result<EvaluationVerdict, EvaluatorError>>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        _reply: &str,
        _message: &str,
        _history: &[Message],
    ) -> Result<EvaluationVerdict, EvaluatorError> {
        *self.calls.lock().unwrap() += 1;
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EvaluatorError::Malformed("no verdict".into())))
    }
}

struct Harness {
    orchestrator: TurnOrchestrator,
    engine: Arc<ScriptedEngine>,
    evaluator: Arc<ScriptedEvaluator>,
    notifier: Arc<RecordingNotifier>,
    events: tokio::sync::mpsc::UnboundedReceiver<TurnEvent>,
}

fn persona_context() -> Arc<PersonaContext> {
    Arc::new(PersonaContext {
        name: "Joshua".into(),
        summary: "Data analyst.".into(),
        profile: "Profile.".into(),
        resume_text: "Resume.".into(),
    })
}

fn harness(
    outcomes: Vec<Result<GenerationOutcome, GenerationError>>,
    verdicts: Vec<Result<EvaluationVerdict, EvaluatorError>>,
    max_rounds: usize,
) -> Harness {
    let engine = Arc::new(ScriptedEngine::new(outcomes));
    let evaluator = Arc::new(ScriptedEvaluator::new(verdicts));
    let notifier = Arc::new(RecordingNotifier::new());
    let registry = default_registry(notifier.clone(), Duration::from_secs(1)).unwrap();
    let executor = Arc::new(CapabilityExecutor::new(registry, 5));
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    let components = TurnComponents {
        classifier: Arc::new(PatternSafetyClassifier::new(DEFAULT_OFFENSIVE_PATTERNS).unwrap()),
        policy: EscalationPolicy::default(),
        notifier: notifier.clone(),
        notify_timeout: Duration::from_secs(1),
        tool_loop: ToolLoop::new(engine.clone(), executor).with_max_rounds(max_rounds),
        evaluator: evaluator.clone(),
        retry: RetryCoordinator::new(engine.clone(), persona_context()),
        instructions: "You are Joshua.".into(),
    };
    Harness {
        orchestrator: TurnOrchestrator::new(components).with_event_tx(tx),
        engine,
        evaluator,
        notifier,
        events: rx,
    }
}

fn text(s: &str) -> Result<GenerationOutcome, GenerationError> {
    Ok(GenerationOutcome::FinalText(s.to_string()))
}

fn tool(id: &str, name: &str, args: serde_json::Value) -> Result<GenerationOutcome, GenerationError> {
    Ok(GenerationOutcome::ToolRequest(vec![CapabilityInvocation {
        id: id.into(),
        name: name.into(),
        args,
    }]))
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<TurnEvent>) -> Vec<TurnEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn phases(events: &[TurnEvent]) -> Vec<TurnPhase> {
    events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::PhaseChanged { phase } => Some(*phase),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_plain_question_is_accepted_verbatim() {
    let mut h = harness(
        vec![text("Probably teal — it reminds me of dashboards.")],
        vec![Ok(EvaluationVerdict::accept())],
        5,
    );
    let mut session = Session::new();
    let reply = h
        .orchestrator
        .handle_turn(&mut session, "What's your favorite color?", &[])
        .await
        .unwrap();

    assert_eq!(reply.text, "Probably teal — it reminds me of dashboards.");
    assert_eq!(reply.phase, TurnPhase::Accepted);
    assert_eq!(h.engine.seen().len(), 1);
    assert_eq!(h.evaluator.calls(), 1);
    assert_eq!(session.strikes(), 0);
    assert_eq!(
        phases(&drain(&mut h.events)),
        vec![
            TurnPhase::Start,
            TurnPhase::Classifying,
            TurnPhase::Resolving,
            TurnPhase::Evaluating,
            TurnPhase::Accepted
        ]
    );
}

#[tokio::test]
async fn test_offensive_message_is_blocked_without_generation() {
    let h = harness(vec![text("should not be used")], vec![], 5);
    let mut session = Session::new();
    let reply = h
        .orchestrator
        .handle_turn(&mut session, "this is shit", &[])
        .await
        .unwrap();

    assert_eq!(reply.text, FIRST_STRIKE_MESSAGE);
    assert_eq!(reply.phase, TurnPhase::Blocked);
    assert_eq!(session.strikes(), 1);
    assert!(h.engine.seen().is_empty());
    assert_eq!(h.evaluator.calls(), 0);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_strike_ladder_notifies_from_third_strike() {
    let h = harness(vec![], vec![], 5);
    let mut session = Session::new();
    let mut replies = Vec::new();
    for _ in 0..4 {
        let reply = h
            .orchestrator
            .handle_turn(&mut session, "you bitch", &[])
            .await
            .unwrap();
        replies.push(reply.text);
    }
    assert_eq!(
        replies,
        vec![FIRST_STRIKE_MESSAGE, SECOND_STRIKE_MESSAGE, TERMINATION_MESSAGE, TERMINATION_MESSAGE]
    );
    assert_eq!(session.strikes(), 4);
    assert_eq!(h.notifier.sent(), vec![SAFETY_ALERT_TEXT.to_string(), SAFETY_ALERT_TEXT.to_string()]);
}

#[tokio::test]
async fn test_contact_capability_round() {
    let mut h = harness(
        vec![
            tool("c1", "record_contact_interest", json!({"email": "a@b.com"})),
            text("Thanks! I'll be in touch."),
        ],
        vec![Ok(EvaluationVerdict::accept())],
        5,
    );
    let mut session = Session::new();
    let reply = h
        .orchestrator
        .handle_turn(&mut session, "Let's connect, I'm a@b.com", &[])
        .await
        .unwrap();

    assert_eq!(reply.text, "Thanks! I'll be in touch.");
    let events = drain(&mut h.events);
    let calls: Vec<&TurnEvent> = events
        .iter()
        .filter(|e| matches!(e, TurnEvent::CapabilityCall { .. }))
        .collect();
    assert_eq!(calls.len(), 1);
    assert!(matches!(
        calls[0],
        TurnEvent::CapabilityCall { name, args, .. } if name == "record_contact_interest" && args["email"] == "a@b.com"
    ));
    assert!(events.contains(&TurnEvent::CapabilityResult {
        id: "c1".into(),
        name: "record_contact_interest".into(),
        ok: true
    }));
    assert_eq!(
        h.notifier.sent(),
        vec!["Recording not provided with email a@b.com and notes not provided".to_string()]
    );

    // 第二次生成看到占位条目 + 结果条目
    let seen = h.engine.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].transcript_len, 0);
    assert_eq!(seen[1].transcript_len, 2);
    assert_eq!(seen[1].capability_count, 2);
}

#[tokio::test]
async fn test_rejected_reply_is_regenerated_once_without_capabilities() {
    let mut h = harness(
        vec![text("yo, whatever"), text("Thanks for asking! Here's a clearer answer.")],
        vec![Ok(EvaluationVerdict::reject("too informal"))],
        5,
    );
    let mut session = Session::new();
    let reply = h
        .orchestrator
        .handle_turn(&mut session, "Tell me about your work", &[])
        .await
        .unwrap();

    assert_eq!(reply.text, "Thanks for asking! Here's a clearer answer.");
    assert_eq!(reply.phase, TurnPhase::Done);
    assert_eq!(h.evaluator.calls(), 1);

    let seen = h.engine.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].capability_count, 0);
    assert!(seen[1].instructions.contains("too informal"));
    assert!(seen[1].instructions.contains("yo, whatever"));

    let events = drain(&mut h.events);
    assert!(!events.iter().any(|e| matches!(e, TurnEvent::CapabilityCall { .. })));
    assert_eq!(phases(&events).last(), Some(&TurnPhase::Done));
}

#[tokio::test]
async fn test_retry_requesting_tools_is_an_error() {
    let h = harness(
        vec![
            text("meh"),
            tool("c1", "record_unanswered_question", json!({"question": "q"})),
        ],
        vec![Ok(EvaluationVerdict::reject("vague"))],
        5,
    );
    let mut session = Session::new();
    let err = h
        .orchestrator
        .handle_turn(&mut session, "What's your salary?", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::UnexpectedToolRequest));
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_round_bound_exceeded() {
    let outcomes = (0..10)
        .map(|i| tool(&format!("c{i}"), "record_unanswered_question", json!({"question": "loop"})))
        .collect();
    let h = harness(outcomes, vec![], 3);
    let mut session = Session::new();
    let err = h
        .orchestrator
        .handle_turn(&mut session, "loop forever", &[])
        .await
        .unwrap_err();

    assert!(matches!(err, TurnError::ToolRoundLimitExceeded { max_rounds: 3 }));
    assert_eq!(h.engine.seen().len(), 4);
    assert_eq!(h.notifier.sent().len(), 3);
    assert_eq!(h.evaluator.calls(), 0);
}

#[tokio::test]
async fn test_unknown_capability_and_missing_argument_do_not_abort() {
    let h = harness(
        vec![
            Ok(GenerationOutcome::ToolRequest(vec![
                CapabilityInvocation {
                    id: "c1".into(),
                    name: "launch_rockets".into(),
                    args: json!({}),
                },
                CapabilityInvocation {
                    id: "c2".into(),
                    name: "record_contact_interest".into(),
                    args: json!({"name": "Ann"}),
                },
            ])),
            text("Could you share your email?"),
        ],
        vec![Ok(EvaluationVerdict::accept())],
        5,
    );
    let mut session = Session::new();
    let reply = h
        .orchestrator
        .handle_turn(&mut session, "I'm Ann", &[])
        .await
        .unwrap();
    assert_eq!(reply.text, "Could you share your email?");
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.engine.seen()[1].transcript_len, 3);
}

#[tokio::test]
async fn test_malformed_tool_call_is_retried_within_bound() {
    let h = harness(
        vec![
            Err(GenerationError::MalformedToolCall("{\"tool\": ".into())),
            text("Happy to help."),
        ],
        vec![Ok(EvaluationVerdict::accept())],
        5,
    );
    let mut session = Session::new();
    let reply = h.orchestrator.handle_turn(&mut session, "hi", &[]).await.unwrap();
    assert_eq!(reply.text, "Happy to help.");
    assert_eq!(h.engine.seen()[1].transcript_len, 1);
}

#[tokio::test]
async fn test_generation_failure_is_fatal() {
    let h = harness(
        vec![Err(GenerationError::Llm(LlmError::Timeout(60)))],
        vec![],
        5,
    );
    let mut session = Session::new();
    let err = h.orchestrator.handle_turn(&mut session, "hi", &[]).await.unwrap_err();
    assert!(matches!(err, TurnError::Generation(GenerationError::Llm(LlmError::Timeout(60)))));
    assert_eq!(h.evaluator.calls(), 0);
}

#[tokio::test]
async fn test_evaluator_failure_is_not_treated_as_acceptable() {
    let h = harness(
        vec![text("An answer")],
        vec![Err(EvaluatorError::Malformed("garbage".into()))],
        5,
    );
    let mut session = Session::new();
    let err = h.orchestrator.handle_turn(&mut session, "hi", &[]).await.unwrap_err();
    assert!(matches!(err, TurnError::Evaluation(_)));
    assert_eq!(h.engine.seen().len(), 1);
}

#[tokio::test]
async fn test_cancelled_session_produces_no_reply() {
    let h = harness(vec![text("never")], vec![Ok(EvaluationVerdict::accept())], 5);
    let mut session = Session::new();
    session.cancel();
    let err = h.orchestrator.handle_turn(&mut session, "hi", &[]).await.unwrap_err();
    assert!(matches!(err, TurnError::Cancelled));
    assert!(h.engine.seen().is_empty());
}

#[tokio::test]
async fn test_identical_inputs_yield_identical_replies() {
    let history = vec![Message::user("Hello"), Message::assistant("Hi there!")];
    let mut replies = Vec::new();
    for _ in 0..2 {
        let h = harness(
            vec![
                tool("c1", "record_unanswered_question", json!({"question": "chess?"})),
                text("I don't know, but I've noted it."),
            ],
            vec![Ok(EvaluationVerdict::accept())],
            5,
        );
        let mut session = Session::with_strikes(1);
        replies.push(
            h.orchestrator
                .handle_turn(&mut session, "Do you play chess?", &history)
                .await
                .unwrap(),
        );
    }
    assert_eq!(replies[0], replies[1]);
}

#[tokio::test]
async fn test_sessions_do_not_share_strikes() {
    let h = harness(vec![text("Hello!")], vec![Ok(EvaluationVerdict::accept())], 5);
    let mut rude = Session::new();
    let mut polite = Session::new();
    h.orchestrator.handle_turn(&mut rude, "racist joke", &[]).await.unwrap();
    let reply = h.orchestrator.handle_turn(&mut polite, "hello", &[]).await.unwrap();
    assert_eq!(rude.strikes(), 1);
    assert_eq!(polite.strikes(), 0);
    assert_eq!(reply.phase, TurnPhase::Accepted);
}

#[tokio::test]
async fn test_cancellation_only_aborts_the_current_turn() {
    let h = harness(vec![text("Hello again!")], vec![Ok(EvaluationVerdict::accept())], 5);
    let mut session = Session::new();
    session.cancel();

    let first = h.orchestrator.handle_turn(&mut session, "hi", &[]).await;
    assert!(matches!(first, Err(TurnError::Cancelled)));
    assert!(!session.is_cancelled());

    let second = h.orchestrator.handle_turn(&mut session, "hi", &[]).await.unwrap();
    assert_eq!(second.text, "Hello again!");
    assert_eq!(second.phase, TurnPhase::Accepted);
}

/// 永不返回的通知通道
struct HangingNotifier;

#[async_trait]
impl Notifier for HangingNotifier {
    async fn notify(&self, _text: &str) -> Result<(), NotifyError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_cancel_interrupts_safety_alert_dispatch() {
    let engine = Arc::new(ScriptedEngine::new(vec![]));
    let registry = default_registry(Arc::new(RecordingNotifier::new()), Duration::from_secs(1)).unwrap();
    let orchestrator = TurnOrchestrator::new(TurnComponents {
        classifier: Arc::new(PatternSafetyClassifier::new(DEFAULT_OFFENSIVE_PATTERNS).unwrap()),
        policy: EscalationPolicy::default(),
        notifier: Arc::new(HangingNotifier),
        notify_timeout: Duration::from_secs(60),
        tool_loop: ToolLoop::new(engine.clone(), Arc::new(CapabilityExecutor::new(registry, 5))),
        evaluator: Arc::new(ScriptedEvaluator::new(vec![])),
        retry: RetryCoordinator::new(engine, persona_context()),
        instructions: "You are Joshua.".into(),
    });

    let mut session = Session::with_strikes(2);
    let token = session.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = std::time::Instant::now();
    let err = orchestrator
        .handle_turn(&mut session, "you bitch", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(session.strikes(), 3);
}

fn llm_orchestrator(
    generation: Arc<dyn LlmClient>,
    judge: Arc<dyn LlmClient>,
    timeout: Duration,
) -> TurnOrchestrator {
    let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());
    let registry = default_registry(notifier.clone(), Duration::from_millis(100)).unwrap();
    let engine: Arc<dyn GenerationEngine> = Arc::new(LlmGenerationEngine::new(generation, timeout));
    TurnOrchestrator::new(TurnComponents {
        classifier: Arc::new(LlmSafetyClassifier::new(judge.clone(), timeout)),
        policy: EscalationPolicy::default(),
        notifier,
        notify_timeout: Duration::from_millis(100),
        tool_loop: ToolLoop::new(engine.clone(), Arc::new(CapabilityExecutor::new(registry, 1))),
        evaluator: Arc::new(LlmEvaluator::new(judge, persona_context(), timeout)),
        retry: RetryCoordinator::new(engine, persona_context()),
        instructions: "You are Joshua.".into(),
    })
}

#[tokio::test]
async fn test_stalled_judge_fails_open_for_safety_but_fails_turn_at_evaluation() {
    let generation = Arc::new(ScriptedLlmClient::new(["Plain answer."]));
    let judge = Arc::new(DelayedLlmClient::new(Duration::from_secs(5), r#"{"is_offensive": true}"#));
    let orchestrator = llm_orchestrator(generation.clone(), judge, Duration::from_millis(50));

    let mut session = Session::new();
    let err = orchestrator
        .handle_turn(&mut session, "Tell me about your work", &[])
        .await
        .unwrap_err();

    assert!(matches!(err, TurnError::Evaluation(EvaluatorError::Timeout(_))));
    assert_eq!(session.strikes(), 0);
    assert_eq!(generation.call_count(), 1);
}

#[tokio::test]
async fn test_stalled_generation_fails_turn_with_timeout() {
    let generation = Arc::new(DelayedLlmClient::new(Duration::from_secs(5), "too late"));
    let orchestrator = llm_orchestrator(generation, Arc::new(MockLlmClient), Duration::from_millis(50));

    let mut session = Session::new();
    let err = orchestrator
        .handle_turn(&mut session, "Tell me about your work", &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TurnError::Generation(GenerationError::Llm(LlmError::Timeout(_)))
    ));
}
