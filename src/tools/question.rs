//! record_unanswered_question：记录答不上来的问题，并推送通知

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::notify::{dispatch_best_effort, Notifier};
use crate::tools::{Capability, CapabilitySpec, ParamKind, ParamSpec};

pub const RECORD_UNANSWERED_QUESTION: &str = "record_unanswered_question";

#[derive(Debug, Deserialize)]
struct QuestionArgs {
    question: String,
}

pub struct UnansweredQuestionTool {
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
}

impl UnansweredQuestionTool {
    pub fn new(notifier: Arc<dyn Notifier>, notify_timeout: Duration) -> Self {
        Self {
            notifier,
            notify_timeout,
        }
    }
}

#[async_trait]
impl Capability for UnansweredQuestionTool {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec::new(
            RECORD_UNANSWERED_QUESTION,
            "Always use this tool to record any question that couldn't be answered as you didn't know the answer",
        )
        .param(ParamSpec::required(
            "question",
            ParamKind::String,
            "The question that couldn't be answered",
        ))
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: QuestionArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        dispatch_best_effort(
            &self.notifier,
            &format!("Recording {}", args.question),
            self.notify_timeout,
        )
        .await;
        Ok(json!({ "recorded": "ok" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;

    #[tokio::test]
    async fn test_records_question() {
        let rec = Arc::new(RecordingNotifier::new());
        let tool = UnansweredQuestionTool::new(rec.clone(), Duration::from_secs(1));
        let out = tool.execute(json!({"question": "Favourite chess opening?"})).await.unwrap();
        assert_eq!(out["recorded"], "ok");
        assert_eq!(rec.sent(), vec!["Recording Favourite chess opening?".to_string()]);
    }
}
