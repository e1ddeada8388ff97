//! Persona - 终端聊天宿主
//!
//! 入口：初始化日志、加载配置与 persona 资料、创建编排器，然后逐行读取 stdin，每行一轮。
//! 宿主持有会话历史与 Session；成功的一轮才写入历史。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use persona::agent::create_orchestrator;
use persona::config::{load_config, AppConfig};
use persona::memory::ConversationHistory;
use persona::persona::{FilePersonaLoader, PersonaLoader};
use persona::Session;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    persona::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let persona_ctx = FilePersonaLoader::from_config(&cfg.persona)
        .load()
        .context("Failed to load persona material")?;
    let orchestrator = create_orchestrator(&cfg, Arc::new(persona_ctx)).context("Failed to create orchestrator")?;

    let mut session = Session::new();
    let mut history = ConversationHistory::new();
    tracing::info!(session = %session.id(), "chat session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message == "/quit" {
            break;
        }
        if !message.is_empty() {
            match orchestrator.handle_turn(&mut session, message, history.messages()).await {
                Ok(reply) => {
                    stdout.write_all(format!("{}\n", reply.text).as_bytes()).await?;
                    history.record_turn(message, reply.text);
                }
                Err(e) => {
                    stdout
                        .write_all(format!("[error] {} (please try again)\n", e).as_bytes())
                        .await?;
                }
            }
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    let elapsed = chrono::Utc::now() - session.started_at();
    tracing::info!(
        session = %session.id(),
        started_at = %session.started_at().to_rfc3339(),
        duration_secs = elapsed.num_seconds(),
        strikes = session.strikes(),
        turns = history.len() / 2,
        "chat session ended"
    );
    Ok(())
}
