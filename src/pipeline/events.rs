//! 单轮过程事件：用于前端展示阶段切换、警告、能力调用与质检结果

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::TurnPhase;

/// 单轮过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    PhaseChanged { phase: TurnPhase },
    /// 本轮判定为冒犯，警告数更新
    StrikeRecorded { strikes: u32, notified: bool },
    CapabilityCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },
    CapabilityResult { id: String, name: String, ok: bool },
    Evaluated { acceptable: bool, feedback: String },
    Error { text: String },
}

pub(crate) fn send_event(tx: Option<&UnboundedSender<TurnEvent>>, ev: TurnEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}
