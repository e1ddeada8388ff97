//! 会话句柄：警告计数与取消
//!
//! 每个活跃对话一个 Session，不跨会话共享；警告计数单写者，由编排器在本会话的轮内更新。
//! 持有 CancellationToken，宿主断开时取消当前轮，编排器在下一个挂起点退出；之后的轮次使用新令牌。

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 会话级状态：创建时警告数为 0，会话内只增不减
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    strikes: u32,
    cancel_token: CancellationToken,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            strikes: 0,
            cancel_token: CancellationToken::new(),
        }
    }

    /// 以给定警告数开始（测试与会话迁移用）
    pub fn with_strikes(strikes: u32) -> Self {
        Self {
            strikes,
            ..Self::new()
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    /// 仅允许非递减更新
    pub(crate) fn set_strikes(&mut self, strikes: u32) {
        debug_assert!(strikes >= self.strikes);
        self.strikes = self.strikes.max(strikes);
    }

    /// 当前轮的取消令牌；被取消的一轮结束后会换新，宿主应在每轮开始前重新获取
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// 取消当前轮（宿主断开）
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 换新取消令牌；警告数不受影响
    pub(crate) fn renew_cancel_token(&mut self) {
        self.cancel_token = CancellationToken::new();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
