//! # Config 模块
//!
//! 解析与检查相关的配置项。
//!
//! ## 配置优先级
//!
//! 1. 调用方直接修改的字段（最高）
//! 2. 配置文件（JSON）
//! 3. 默认值（最低）

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::script::command::{AnyCommand, BUILTIN_COMMANDS, CommandCatalog, KnownCommands};

/// 脚本配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// 变量在局部与全局表中都找不到时，是否查询进程环境变量
    #[serde(default = "default_environment_fallback")]
    pub environment_fallback: bool,

    /// 合法的命令名
    #[serde(default = "default_commands")]
    pub commands: Vec<String>,

    /// 接受任意命令名（忽略 `commands`）
    #[serde(default)]
    pub allow_unknown_commands: bool,

    /// 元组/数组结构相等比较使用的运行时辅助函数
    #[serde(default = "default_array_helper")]
    pub array_helper: String,

    /// 字典结构相等比较使用的运行时辅助函数
    #[serde(default = "default_json_helper")]
    pub json_helper: String,

    /// 脚本文件扩展名（不含 `.`）
    #[serde(default = "default_extension")]
    pub extension: String,
}

// 默认值函数
fn default_environment_fallback() -> bool {
    true
}

fn default_commands() -> Vec<String> {
    BUILTIN_COMMANDS.iter().map(|s| s.to_string()).collect()
}

fn default_array_helper() -> String {
    "compareArrayLike".to_string()
}

fn default_json_helper() -> String {
    "compareJson".to_string()
}

fn default_extension() -> String {
    "goml".to_string()
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            environment_fallback: default_environment_fallback(),
            commands: default_commands(),
            allow_unknown_commands: false,
            array_helper: default_array_helper(),
            json_helper: default_json_helper(),
            extension: default_extension(),
        }
    }
}

impl ScriptConfig {
    /// 加载配置文件
    ///
    /// 如果文件不存在或解析失败，返回默认配置并记录警告。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Self::default();
        }

        match Self::try_load(path) {
            Ok(config) => {
                info!(path = %path.display(), "config loaded");
                config
            }
            Err(e) => {
                warn!(error = %e, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// 加载并验证配置文件，任何失败都返回错误
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.array_helper.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "array_helper must not be empty".to_string(),
            ));
        }
        if self.json_helper.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "json_helper must not be empty".to_string(),
            ));
        }
        if self.extension.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "extension must not be empty".to_string(),
            ));
        }
        if !self.allow_unknown_commands && self.commands.is_empty() {
            return Err(ConfigError::Invalid(
                "commands must not be empty unless allow_unknown_commands is set".to_string(),
            ));
        }
        Ok(())
    }

    /// 按配置构造命令名目录
    pub fn catalog(&self) -> Box<dyn CommandCatalog + Send + Sync> {
        if self.allow_unknown_commands {
            Box::new(AnyCommand)
        } else {
            Box::new(KnownCommands::new(self.commands.iter().cloned()))
        }
    }
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 解析或序列化失败
    #[error("config json error: {0}")]
    Json(#[from] serde_json::Error),

    /// 验证失败
    #[error("invalid config: {0}")]
    Invalid(String),
}
