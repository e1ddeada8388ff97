//! 单轮状态机的阶段定义
//!
//! Start → Classifying → (Blocked | Resolving) → Evaluating → (Accepted | Retrying → Done)。
//! 只有 Session 中的警告计数跨轮存活，阶段均为轮内状态。

use serde::Serialize;

/// 单轮阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Start,
    Classifying,
    /// 终态：升级策略给出了提示语
    Blocked,
    Resolving,
    Evaluating,
    /// 终态：评估通过
    Accepted,
    Retrying,
    /// 终态：带反馈重生成完成
    Done,
}

impl TurnPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnPhase::Blocked | TurnPhase::Accepted | TurnPhase::Done)
    }
}

/// 本轮最终回复及其终态
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub phase: TurnPhase,
}
