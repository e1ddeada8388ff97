//! 能力执行器
//!
//! 持有 CapabilityRegistry 与单次调用超时；execute 在超时内调用 registry.invoke，
//! 未知能力转为空结果并告警，超时转为失败结果；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::time::timeout;

use crate::tools::{CapabilityInvocation, CapabilityRegistry, CapabilityResult, CapabilitySpec};

/// 能力执行器：所有失败都落为 CapabilityResult，从不中断本轮
pub struct CapabilityExecutor {
    registry: Arc<CapabilityRegistry>,
    timeout: Duration,
}

impl CapabilityExecutor {
    pub fn new(registry: CapabilityRegistry, timeout_secs: u64) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn catalog(&self) -> Vec<CapabilitySpec> {
        self.registry.catalog()
    }

    pub async fn execute(&self, invocation: &CapabilityInvocation) -> CapabilityResult {
        let start = Instant::now();
        let result = timeout(self.timeout, self.registry.invoke(invocation)).await;

        let (res, outcome) = match result {
            Ok(Ok(r)) => {
                let outcome = if r.ok { "ok" } else { "error" };
                (r, outcome)
            }
            Ok(Err(e)) => {
                tracing::warn!(capability = %invocation.name, error = %e, "unknown capability requested, substituting empty result");
                (CapabilityResult::empty(invocation), "unknown")
            }
            Err(_) => (
                CapabilityResult::failed(invocation, format!("timed out after {:?}", self.timeout)),
                "timeout",
            ),
        };

        let audit = serde_json::json!({
            "event": "capability_audit",
            "capability": invocation.name,
            "call_id": invocation.id,
            "ok": res.ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&invocation.args),
        });
        tracing::info!(audit = %audit.to_string(), "capability");
        res
    }

    /// 执行一轮调用：同轮调用互不依赖，并发执行，结果按请求顺序返回
    pub async fn execute_round(&self, invocations: &[CapabilityInvocation]) -> Vec<CapabilityResult> {
        join_all(invocations.iter().map(|inv| self.execute(inv))).await
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
