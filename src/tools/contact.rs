//! record_contact_interest：记录有意联系的访客（邮箱必填），并推送通知

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::notify::{dispatch_best_effort, Notifier};
use crate::tools::{Capability, CapabilitySpec, ParamKind, ParamSpec};

pub const RECORD_CONTACT_INTEREST: &str = "record_contact_interest";

const NOT_PROVIDED: &str = "not provided";

#[derive(Debug, Deserialize)]
struct ContactArgs {
    email: String,
    name: Option<String>,
    notes: Option<String>,
}

pub struct ContactInterestTool {
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
}

impl ContactInterestTool {
    pub fn new(notifier: Arc<dyn Notifier>, notify_timeout: Duration) -> Self {
        Self {
            notifier,
            notify_timeout,
        }
    }
}

#[async_trait]
impl Capability for ContactInterestTool {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec::new(
            RECORD_CONTACT_INTEREST,
            "Use this tool to record that a user is interested in being in touch and provided an email address",
        )
        .param(ParamSpec::required("email", ParamKind::String, "The email address of this user"))
        .param(ParamSpec::optional("name", ParamKind::String, "The user's name, if they provided it"))
        .param(ParamSpec::optional(
            "notes",
            ParamKind::String,
            "Any additional information about the conversation that's worth recording to give context",
        ))
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: ContactArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        if args.email.trim().is_empty() {
            return Err("email must not be empty".to_string());
        }
        let name = args.name.as_deref().unwrap_or(NOT_PROVIDED);
        let notes = args.notes.as_deref().unwrap_or(NOT_PROVIDED);
        let text = format!("Recording {} with email {} and notes {}", name, args.email, notes);
        dispatch_best_effort(&self.notifier, &text, self.notify_timeout).await;
        Ok(json!({ "recorded": "ok" }))
    }
}
