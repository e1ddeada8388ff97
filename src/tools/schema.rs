//! 能力（工具）参数声明与校验
//!
//! 每个能力声明自己的参数表（名称、类型、必填），注册时校验声明本身，调用时据此校验参数；
//! 同一份声明也用于生成注入 prompt 的 JSON Schema。

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::tools::RegistryError;

/// 参数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
}

impl ParamKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }
}

/// 单个参数声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// 能力声明：名称（唯一键）、描述（供 LLM 理解）、参数表
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl CapabilitySpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// 注册时校验：名称合法、参数名非空且不重复
    pub fn validate(&self) -> Result<(), RegistryError> {
        let name_ok = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !name_ok {
            return Err(RegistryError::InvalidSpec(format!(
                "invalid capability name '{}'",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for p in &self.params {
            if p.name.is_empty() || !seen.insert(p.name.as_str()) {
                return Err(RegistryError::InvalidSpec(format!(
                    "capability '{}' has empty or duplicate parameter '{}'",
                    self.name, p.name
                )));
            }
        }
        Ok(())
    }

    /// 调用时校验参数：必须是对象、必填齐全、类型匹配、不允许未声明字段
    pub fn check_args(&self, args: &Value) -> Result<(), String> {
        let obj = args
            .as_object()
            .ok_or_else(|| "arguments must be a JSON object".to_string())?;

        for p in &self.params {
            match obj.get(&p.name) {
                None | Some(Value::Null) if p.required => {
                    return Err(format!("missing required argument '{}'", p.name));
                }
                Some(v) if !v.is_null() && !p.kind.matches(v) => {
                    return Err(format!(
                        "argument '{}' must be of type {:?}",
                        p.name, p.kind
                    ));
                }
                _ => {}
            }
        }
        if let Some(unknown) = obj.keys().find(|k| !self.params.iter().any(|p| &p.name == *k)) {
            return Err(format!("unexpected argument '{}'", unknown));
        }
        Ok(())
    }

    /// 参数 JSON Schema（additionalProperties: false）
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            properties.insert(
                p.name.clone(),
                json!({ "type": p.kind, "description": p.description }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }
}

/// 生成能力目录 JSON（name / description / parameters），拼入 system prompt
pub fn catalog_schema_json(specs: &[CapabilitySpec]) -> String {
    let tools: Vec<Value> = specs
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "description": s.description,
                "parameters": s.parameters_schema()
            })
        })
        .collect();
    serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
}
