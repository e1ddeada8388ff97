//! 记忆层：会话历史（由宿主持有，按轮只读传入编排器）

pub mod conversation;

pub use conversation::{render_transcript, ConversationHistory, Message, Role};
