//! # Command Script
//!
//! 浏览器 UI 测试命令脚本的语言前端。
//!
//! ## 架构概述
//!
//! 每条语句是一个命令名加一个字面量参数（元组、数组、字典、表达式或单个值）。
//! 本库负责把脚本文本变成经过检查的 AST，交给下游编译器生成自动化指令：
//!
//! ```text
//! 脚本文本 ──► Parser ──► ParsedScript（缓存）
//!                              │
//!                              ▼ 每次执行
//!               substitute（变量）──► evaluate（表达式）──► CommandDispatch
//! ```
//!
//! 所有错误都以诊断的形式挂在 AST 上，一次解析报告整个文件的全部问题；
//! 致命错误（未闭合的字符串或括号、未知命令、找不到的变量）会停止后续解析。
//!
//! ## 使用示例
//!
//! ```ignore
//! use command_script::{AstLoader, ScriptConfig, Variables, compile_script};
//!
//! let config = ScriptConfig::load("script-config.json");
//! let loader = AstLoader::new(config.clone());
//! let script = loader.load("tests/basic.goml")?;
//!
//! for diag in &script.diagnostics {
//!     eprintln!("{diag}");
//! }
//!
//! let output = compile_script(&script, &Variables::new(), &config, &my_compiler);
//! ```
//!
//! ## 模块结构
//!
//! - [`script`]：词法分析、AST 与解析器
//! - [`variables`]：变量取值与替换
//! - [`eval`]：表达式类型检查
//! - [`loader`]：按路径加载与缓存
//! - [`dispatch`]：逐条交给下游编译器
//! - [`diagnostic`]：诊断
//! - [`config`]：配置
//! - [`error`]：错误类型定义

pub mod config;
pub mod diagnostic;
pub mod dispatch;
pub mod error;
pub mod eval;
pub mod loader;
pub mod script;
pub mod variables;

// 重导出核心类型
pub use config::{ConfigError, ScriptConfig};
pub use diagnostic::{Diagnostic, DiagnosticResult};
pub use dispatch::{CommandDispatch, CompileOutput, compile_script};
pub use error::{LoadError, ScriptError, ScriptResult};
pub use eval::evaluate;
pub use loader::{AstCache, AstLoader, normalize_path};
pub use script::{
    AnyCommand, BUILTIN_COMMANDS, CommandCatalog, CommandNode, Element, ElementError, Kind,
    KnownCommands, Node, ParsedScript, Parser, Prepared, parse_element,
};
pub use variables::{VariableProvider, VariableValue, Variables, substitute};
