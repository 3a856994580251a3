//! # Error 模块
//!
//! 定义 command-script 中使用的错误类型。
//!
//! 脚本本身的语法与类型错误不走这里：它们作为诊断挂在 AST 节点上
//! （见 [`crate::diagnostic`]），这里只有文件与配置层面的失败。

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// 脚本加载错误
#[derive(Error, Debug)]
pub enum LoadError {
    /// 读取脚本文件失败
    #[error("failed to read script `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 无法规范化的路径
    #[error("invalid script path `{}`: {message}", path.display())]
    InvalidPath { path: PathBuf, message: String },
}

/// command-script 统一错误类型
#[derive(Error, Debug)]
pub enum ScriptError {
    /// 加载错误
    #[error(transparent)]
    Load(#[from] LoadError),

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result 类型别名
pub type ScriptResult<T> = Result<T, ScriptError>;
