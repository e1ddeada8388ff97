//! 核心编排层：错误与恢复、阶段定义、会话句柄、单轮编排器

pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod session;
pub mod state;

pub use error::{RecoveryAction, TurnError};
pub use orchestrator::{TurnComponents, TurnOrchestrator};
pub use recovery::RecoveryEngine;
pub use session::Session;
pub use state::{Reply, TurnPhase};
