//! 警告升级策略（纯函数）
//!
//! (当前警告数, 判定) -> (新警告数, 提示语, 是否外部告警)。
//! 第 1 次礼貌引导，第 2 次更坚决，第 3 次起终止对话并告警。

use crate::pipeline::SafetyVerdict;

pub const FIRST_STRIKE_MESSAGE: &str =
    "Let’s keep things respectful — would you like to ask something about my experience?";
pub const SECOND_STRIKE_MESSAGE: &str = "I can only continue this conversation if we keep things respectful. Would you like to talk about my career or projects?";
pub const TERMINATION_MESSAGE: &str =
    "I’m not able to continue with this type of conversation. You may be reported";
/// 越过终止阈值时推送的告警文本
pub const SAFETY_ALERT_TEXT: &str =
    "Safety alert: A user has triggered multiple offensive language warnings.";

pub const TERMINATION_THRESHOLD: u32 = 3;

/// 升级结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub strikes: u32,
    pub message: Option<&'static str>,
    pub notify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// true：阈值及以上每次违规都告警；false：仅越过阈值那一次告警
    pub notify_every_strike_past_threshold: bool,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            notify_every_strike_past_threshold: true,
        }
    }
}

impl EscalationPolicy {
    pub fn escalate(&self, counter: u32, verdict: SafetyVerdict) -> Escalation {
        if !verdict.is_offensive() {
            return Escalation {
                strikes: counter,
                message: None,
                notify: false,
            };
        }

        let strikes = counter.saturating_add(1);
        let (message, notify) = match strikes {
            1 => (FIRST_STRIKE_MESSAGE, false),
            2 => (SECOND_STRIKE_MESSAGE, false),
            n => (
                TERMINATION_MESSAGE,
                self.notify_every_strike_past_threshold || n == TERMINATION_THRESHOLD,
            ),
        };
        Escalation {
            strikes,
            message: Some(message),
            notify,
        }
    }
}

/// 默认策略下的升级
pub fn escalate(counter: u32, verdict: SafetyVerdict) -> Escalation {
    EscalationPolicy::default().escalate(counter, verdict)
}
