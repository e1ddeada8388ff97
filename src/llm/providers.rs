//! 后端预设与按配置选择 LLM
//!
//! DeepSeek、Gemini 均提供 OpenAI 兼容接口，只需替换 base_url 与 API Key。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_FLASH: &str = "gemini-2.0-flash";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// 根据配置与环境变量选择 LLM 后端；`model_override` 用于评估/安全判定使用独立模型
pub fn create_llm_from_config(cfg: &AppConfig, model_override: Option<&str>) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let configured_model = model_override
        .map(String::from)
        .or_else(|| cfg.llm.model.clone());

    match provider.as_str() {
        "deepseek" => {
            if let Ok(key) = std::env::var("DEEPSEEK_API_KEY") {
                let model = configured_model.unwrap_or_else(|| DEEPSEEK_CHAT.to_string());
                let base = cfg.llm.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
                tracing::info!("Using DeepSeek LLM ({})", model);
                return Arc::new(OpenAiClient::new(Some(base), &model, Some(&key)));
            }
        }
        "gemini" => {
            if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
                let model = configured_model.unwrap_or_else(|| GEMINI_FLASH.to_string());
                let base = cfg.llm.base_url.as_deref().unwrap_or(GEMINI_BASE_URL);
                tracing::info!("Using Gemini LLM ({})", model);
                return Arc::new(OpenAiClient::new(Some(base), &model, Some(&key)));
            }
        }
        _ => {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                let model = configured_model.unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string());
                tracing::info!("Using OpenAI LLM ({})", model);
                return Arc::new(OpenAiClient::new(
                    cfg.llm.base_url.as_deref(),
                    &model,
                    Some(&key),
                ));
            }
        }
    }

    tracing::warn!("No API key set for provider '{}', using Mock LLM", provider);
    Arc::new(MockLlmClient)
}
