//! 安全分类器
//!
//! judge 区分「判定服务不可用 / 输出格式错误」与「判定为非冒犯」；
//! classify 在此之上实现 fail-open：判定失败一律视为非冒犯并记日志，审核层故障不能阻断正常使用。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;
use crate::pipeline::generation::extract_json_object;
use crate::pipeline::prompts::{classifier_instructions, classifier_request};

/// 单轮安全判定，不跨轮保留
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    Offensive,
    Clean,
}

impl SafetyVerdict {
    pub fn is_offensive(self) -> bool {
        matches!(self, SafetyVerdict::Offensive)
    }
}

impl From<bool> for SafetyVerdict {
    fn from(offensive: bool) -> Self {
        if offensive {
            SafetyVerdict::Offensive
        } else {
            SafetyVerdict::Clean
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(#[from] LlmError),

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed classifier output: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    /// 原始判定：失败以 Err 返回
    async fn judge(&self, message: &str) -> Result<SafetyVerdict, ClassifierError>;

    /// fail-open 判定
    async fn classify(&self, message: &str) -> SafetyVerdict {
        match self.judge(message).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "safety classification failed, treating message as not offensive");
                SafetyVerdict::Clean
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Offensive {
    is_offensive: bool,
}

/// LLM 判定：结构化布尔输出 {"is_offensive": bool}
pub struct LlmSafetyClassifier {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl LlmSafetyClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }
}

#[async_trait]
impl SafetyClassifier for LlmSafetyClassifier {
    async fn judge(&self, message: &str) -> Result<SafetyVerdict, ClassifierError> {
        let messages = vec![
            Message::system(classifier_instructions()),
            Message::user(classifier_request(message)),
        ];
        let output = tokio::time::timeout(self.timeout, self.llm.complete(&messages))
            .await
            .map_err(|_| ClassifierError::Timeout(self.timeout))??;

        let json = extract_json_object(&output)
            .ok_or_else(|| ClassifierError::Malformed(output.clone()))?;
        let parsed: Offensive = serde_json::from_str(json)
            .map_err(|e| ClassifierError::Malformed(format!("{}: {}", e, json)))?;
        tracing::debug!(is_offensive = parsed.is_offensive, "safety classifier verdict");
        Ok(parsed.is_offensive.into())
    }
}

/// 规则判定：大小写不敏感的正则集合，永不失败
pub struct PatternSafetyClassifier {
    patterns: Vec<Regex>,
}

pub const DEFAULT_OFFENSIVE_PATTERNS: &[&str] = &[
    r"\b(fuck|shit|cunt|bitch|slut)\b",
    r"kill yourself",
    r"racist|sexist",
];

impl PatternSafetyClassifier {
    pub fn new(patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_offensive(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

#[async_trait]
impl SafetyClassifier for PatternSafetyClassifier {
    async fn judge(&self, message: &str) -> Result<SafetyVerdict, ClassifierError> {
        Ok(self.is_offensive(message).into())
    }
}
