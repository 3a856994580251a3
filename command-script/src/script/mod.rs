//! # Script 模块
//!
//! 命令脚本的词法分析、AST 定义与解析器。
//!
//! ## 模块结构
//!
//! - [`token`]：词法分析
//! - [`element`]：参数 AST 节点
//! - [`command`]：命令节点与命令名目录
//! - [`parser`]：递归下降解析器

pub mod command;
pub mod element;
pub mod parser;
pub mod token;

pub use command::{
    AnyCommand, BUILTIN_COMMANDS, CommandCatalog, CommandNode, KnownCommands, Prepared,
};
pub use element::{Element, ElementError, JsonEntry, Kind, Node, Resolved};
pub use parser::{Parser, parse_element};
pub use token::{Operator, Span};

use crate::diagnostic::DiagnosticResult;

/// 一次解析的结果
///
/// 进入缓存后不再修改；执行前通过 [`CommandNode::prepare`] 得到独立副本。
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScript {
    /// 原始文本
    pub text: String,
    /// 按源码顺序排列的命令（遇到致命错误时截断）
    pub commands: Vec<CommandNode>,
    /// 全部解析诊断
    pub diagnostics: DiagnosticResult,
}

impl ParsedScript {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_fatal(&self) -> bool {
        self.diagnostics.has_fatal()
    }

    /// 按名称查找命令
    pub fn commands_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a CommandNode> + 'a {
        self.commands.iter().filter(move |c| c.name == name)
    }
}
