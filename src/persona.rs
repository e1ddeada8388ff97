//! Persona 资料：摘要、档案、简历文本
//!
//! 启动时加载一次，之后只读；加载失败在启动阶段致命，不会出现在单轮处理中。

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::PersonaSection;

#[derive(Error, Debug)]
pub enum PersonaError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 不可变的 persona 资料包
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersonaContext {
    pub name: String,
    pub summary: String,
    pub profile: String,
    pub resume_text: String,
}

/// 资料加载器
pub trait PersonaLoader {
    fn load(&self) -> Result<PersonaContext, PersonaError>;
}

/// 从三个 UTF-8 文本文件加载
#[derive(Debug, Clone)]
pub struct FilePersonaLoader {
    name: String,
    summary_path: PathBuf,
    profile_path: PathBuf,
    resume_path: PathBuf,
}

impl FilePersonaLoader {
    pub fn from_config(section: &PersonaSection) -> Self {
        Self {
            name: section.name.clone(),
            summary_path: section.summary_path.clone(),
            profile_path: section.profile_path.clone(),
            resume_path: section.resume_path.clone(),
        }
    }
}

fn read_text(path: &Path) -> Result<String, PersonaError> {
    std::fs::read_to_string(path).map_err(|source| PersonaError::Read {
        path: path.to_path_buf(),
        source,
    })
}

impl PersonaLoader for FilePersonaLoader {
    fn load(&self) -> Result<PersonaContext, PersonaError> {
        Ok(PersonaContext {
            name: self.name.clone(),
            summary: read_text(&self.summary_path)?,
            profile: read_text(&self.profile_path)?,
            resume_text: read_text(&self.resume_path)?,
        })
    }
}
