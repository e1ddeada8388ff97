//! 能力注册表
//!
//! 所有能力实现 Capability trait（spec / execute），由 CapabilityRegistry 按名注册；
//! 注册时校验声明与名称唯一，调用时未知名称返回 UnknownCapability，参数不合法返回失败结果而不是错误。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::tools::CapabilitySpec;

/// 注册表错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("capability '{0}' is already registered")]
    DuplicateName(String),

    #[error("invalid capability spec: {0}")]
    InvalidSpec(String),

    #[error("unknown capability: {0}")]
    UnknownCapability(String),
}

/// 生成引擎请求的一次能力调用
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityInvocation {
    /// 关联 ID，用于与结果配对
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// 能力调用结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityResult {
    pub id: String,
    pub name: String,
    pub ok: bool,
    pub output: Value,
}

impl CapabilityResult {
    pub fn success(invocation: &CapabilityInvocation, output: Value) -> Self {
        Self {
            id: invocation.id.clone(),
            name: invocation.name.clone(),
            ok: true,
            output,
        }
    }

    pub fn failed(invocation: &CapabilityInvocation, reason: impl Into<String>) -> Self {
        Self {
            id: invocation.id.clone(),
            name: invocation.name.clone(),
            ok: false,
            output: json!({ "error": reason.into() }),
        }
    }

    /// 未知能力：空结果
    pub fn empty(invocation: &CapabilityInvocation) -> Self {
        Self {
            id: invocation.id.clone(),
            name: invocation.name.clone(),
            ok: false,
            output: json!({}),
        }
    }
}

/// 能力 trait：声明 + 异步执行（args 已通过声明校验）
#[async_trait]
pub trait Capability: Send + Sync {
    fn spec(&self) -> CapabilitySpec;

    async fn execute(&self, args: Value) -> Result<Value, String>;
}

struct Entry {
    spec: CapabilitySpec,
    handler: Arc<dyn Capability>,
}

/// 能力注册表：启动后只读；保留注册顺序以生成稳定的能力目录
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: impl Capability + 'static) -> Result<(), RegistryError> {
        let spec = capability.spec();
        spec.validate()?;
        if self.entries.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateName(spec.name));
        }
        self.order.push(spec.name.clone());
        self.entries.insert(
            spec.name.clone(),
            Entry {
                spec,
                handler: Arc::new(capability),
            },
        );
        Ok(())
    }

    /// 按注册顺序返回能力目录
    pub fn catalog(&self) -> Vec<CapabilitySpec> {
        self.order
            .iter()
            .filter_map(|n| self.entries.get(n).map(|e| e.spec.clone()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// 执行一次调用；仅未知名称返回 Err，参数校验失败与处理器失败都转为失败结果
    pub async fn invoke(
        &self,
        invocation: &CapabilityInvocation,
    ) -> Result<CapabilityResult, RegistryError> {
        let entry = self
            .entries
            .get(&invocation.name)
            .ok_or_else(|| RegistryError::UnknownCapability(invocation.name.clone()))?;

        if let Err(reason) = entry.spec.check_args(&invocation.args) {
            return Ok(CapabilityResult::failed(invocation, reason));
        }

        Ok(match entry.handler.execute(invocation.args.clone()).await {
            Ok(output) => CapabilityResult::success(invocation, output),
            Err(reason) => CapabilityResult::failed(invocation, reason),
        })
    }
}
