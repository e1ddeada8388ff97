//! Persona - 人设对话代理
//!
//! 模块划分：
//! - **agent**: 按配置装配编排器
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 单轮编排器、阶段、会话句柄、错误与恢复
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 会话历史
//! - **notify**: 外部通知通道（Pushover / 日志）
//! - **persona**: persona 资料加载
//! - **pipeline**: 安全分类、警告升级、生成适配、工具调用循环、质检、重生成
//! - **tools**: 能力声明、注册表与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod notify;
pub mod observability;
pub mod persona;
pub mod pipeline;
pub mod tools;

pub use crate::core::{Reply, Session, TurnError, TurnOrchestrator, TurnPhase};
