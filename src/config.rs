//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PERSONA__*` 覆盖（双下划线表示嵌套，如 `PERSONA__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub persona: PersonaSection,
    pub llm: LlmSection,
    pub turn: TurnSection,
    pub tools: ToolsSection,
    pub notify: NotifySection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [persona] 段：资料文件路径与展示名
#[derive(Debug, Clone, Deserialize)]
pub struct PersonaSection {
    #[serde(default = "default_persona_name")]
    pub name: String,
    #[serde(default = "default_summary_path")]
    pub summary_path: PathBuf,
    #[serde(default = "default_profile_path")]
    pub profile_path: PathBuf,
    #[serde(default = "default_resume_path")]
    pub resume_path: PathBuf,
}

impl Default for PersonaSection {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            summary_path: default_summary_path(),
            profile_path: default_profile_path(),
            resume_path: default_resume_path(),
        }
    }
}

fn default_persona_name() -> String {
    "Persona".to_string()
}

fn default_summary_path() -> PathBuf {
    PathBuf::from("me/summary.txt")
}

fn default_profile_path() -> PathBuf {
    PathBuf::from("me/profile.txt")
}

fn default_resume_path() -> PathBuf {
    PathBuf::from("me/resume.txt")
}

/// [llm] 段：后端选择、模型与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / deepseek / gemini
    #[serde(default = "default_provider")]
    pub provider: String,
    /// 未设置时按 provider 取默认模型
    pub model: Option<String>,
    /// 安全判定与回复评估使用的模型（默认同 model）
    pub judge_model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            judge_model: None,
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次 LLM 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// 安全分类器实现
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// LLM 判定（结构化布尔输出）
    #[default]
    Llm,
    /// 正则规则
    Pattern,
}

/// [turn] 段：单轮编排参数
#[derive(Debug, Clone, Deserialize)]
pub struct TurnSection {
    /// 工具调用轮数上限，超出即本轮失败
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// 达到第 3 次警告后，是否每次违规都推送告警（false 则仅在越过阈值时推送一次）
    #[serde(default = "default_true")]
    pub notify_every_strike_past_threshold: bool,
    #[serde(default)]
    pub classifier: ClassifierKind,
}

impl Default for TurnSection {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            notify_every_strike_past_threshold: true,
            classifier: ClassifierKind::default(),
        }
    }
}

fn default_max_tool_rounds() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [notify] 段：外部通知通道
#[derive(Debug, Clone, Deserialize)]
pub struct NotifySection {
    /// pushover / log
    #[serde(default = "default_notify_provider")]
    pub provider: String,
    pub pushover_token: Option<String>,
    pub pushover_user: Option<String>,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            provider: default_notify_provider(),
            pushover_token: None,
            pushover_user: None,
            timeout_secs: default_notify_timeout_secs(),
        }
    }
}

fn default_notify_provider() -> String {
    "pushover".to_string()
}

fn default_notify_timeout_secs() -> u64 {
    10
}

impl NotifySection {
    /// Pushover 凭据：配置优先，其次环境变量 PUSHOVER_TOKEN / PUSHOVER_USER
    pub fn pushover_credentials(&self) -> Option<(String, String)> {
        let token = self
            .pushover_token
            .clone()
            .or_else(|| std::env::var("PUSHOVER_TOKEN").ok())?;
        let user = self
            .pushover_user
            .clone()
            .or_else(|| std::env::var("PUSHOVER_USER").ok())?;
        Some((token, user))
    }
}

/// 从 config 目录加载配置，环境变量 PERSONA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PERSONA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PERSONA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
