//! 能力（工具）层：声明、注册表、带超时与审计的执行器、两个默认能力

pub mod contact;
pub mod executor;
pub mod question;
pub mod registry;
pub mod schema;

use std::sync::Arc;
use std::time::Duration;

pub use contact::{ContactInterestTool, RECORD_CONTACT_INTEREST};
pub use executor::CapabilityExecutor;
pub use question::{UnansweredQuestionTool, RECORD_UNANSWERED_QUESTION};
pub use registry::{
    Capability, CapabilityInvocation, CapabilityRegistry, CapabilityResult, RegistryError,
};
pub use schema::{catalog_schema_json, CapabilitySpec, ParamKind, ParamSpec};

use crate::notify::Notifier;

/// 能力内通知的等待上限：必须短于单次能力调用超时，通道卡住时能力本身仍能成功返回
pub fn capability_notify_timeout(notify_timeout: Duration, tool_timeout: Duration) -> Duration {
    if notify_timeout < tool_timeout {
        return notify_timeout;
    }
    let capped = tool_timeout / 2;
    tracing::warn!(
        ?notify_timeout,
        ?tool_timeout,
        ?capped,
        "notify timeout is not below capability timeout, capping it"
    );
    capped
}

/// 默认注册表：record_contact_interest + record_unanswered_question
pub fn default_registry(
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
) -> Result<CapabilityRegistry, RegistryError> {
    let mut registry = CapabilityRegistry::new();
    registry.register(ContactInterestTool::new(notifier.clone(), notify_timeout))?;
    registry.register(UnansweredQuestionTool::new(notifier, notify_timeout))?;
    Ok(registry)
}
