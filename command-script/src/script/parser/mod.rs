//! # Parser 模块
//!
//! 手写递归下降解析器：每种字面量一个解析例程，产出带类型的 AST。
//!
//! ## 架构
//!
//! ```text
//! 原始文本 → [词法分析] → Vec<Token> → [命令切分] → Vec<CommandNode>
//!                                          │
//!                                          └─ 每条命令的参数 → [元素解析] → Element
//! ```
//!
//! ## 设计原则
//!
//! - 容错解析：错误的元素返回带错误的节点而不是中止，兄弟元素照常解析
//! - 缺少闭合分隔符属于致命错误，截断当前命令
//! - 诊断统一在解析结束后遍历 AST 收集
//!
//! ## 模块结构
//!
//! - `cursor`: token 游标与辅助函数
//! - `literal`: 标量字面量与变量
//! - `composite`: 元组、数组、字典、块
//! - `expr`: 运算符链
//! - `statements`: 命令切分

mod composite;
mod cursor;
mod expr;
mod literal;
mod statements;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::debug;

use crate::diagnostic::DiagnosticResult;
use crate::script::ParsedScript;
use crate::script::command::{AnyCommand, CommandCatalog};
use crate::script::element::Element;
use crate::script::token::{Token, tokenize_range};

/// 脚本解析器
pub struct Parser<'a> {
    catalog: &'a dyn CommandCatalog,
}

impl<'a> Parser<'a> {
    /// 创建解析器
    ///
    /// `catalog` 决定哪些命令名合法。
    pub fn new(catalog: &'a dyn CommandCatalog) -> Self {
        Self { catalog }
    }

    /// 解析整个脚本
    ///
    /// 遇到第一个致命诊断后停止消费剩余文本，但保留此前收集到的全部诊断。
    pub fn parse(&self, text: &str) -> ParsedScript {
        let mut parser = ElementParser::new(text, 0, text.len(), 1, self.catalog);
        let commands = parser.parse_commands();

        let mut diagnostics = DiagnosticResult::new();
        for command in &commands {
            command.collect_diagnostics(&mut diagnostics);
        }

        debug!(
            commands = commands.len(),
            errors = diagnostics.error_count(),
            fatal = diagnostics.fatal_count(),
            "parsed script"
        );

        ParsedScript {
            text: text.to_string(),
            commands,
            diagnostics,
        }
    }
}

impl Default for Parser<'static> {
    fn default() -> Self {
        Self::new(&AnyCommand)
    }
}

/// 解析单个参数元素（可以跨行）
///
/// 元素之后若还有内容，错误记录在返回的节点上。
pub fn parse_element(text: &str) -> Arc<Element> {
    let mut parser = ElementParser::new(text, 0, text.len(), 1, &AnyCommand);
    parser.parse_single()
}

/// 容器与块的最大嵌套层数，超过时产出致命诊断而不是继续递归
pub(crate) const MAX_NESTING: usize = 64;

/// 元素解析器：在一段 token 上工作的游标
pub(crate) struct ElementParser<'a> {
    src: &'a str,
    /// 与 `src` 相同的文本，由产出的节点共享
    origin: Arc<str>,
    tokens: Vec<Token>,
    pos: usize,
    /// 本解析器负责的源码范围终点
    end: usize,
    /// 起始行号
    first_line: usize,
    /// 括号嵌套深度；大于 0 时换行视为空白
    depth: usize,
    /// 容器递归层数（块内的子解析器继承外层的层数）
    nesting: usize,
    catalog: &'a dyn CommandCatalog,
}

impl<'a> ElementParser<'a> {
    pub(crate) fn new(
        src: &'a str,
        start: usize,
        end: usize,
        line: usize,
        catalog: &'a dyn CommandCatalog,
    ) -> Self {
        Self {
            src,
            origin: Arc::from(src),
            tokens: tokenize_range(src, start, end, line),
            pos: 0,
            end: end.min(src.len()),
            first_line: line,
            depth: 0,
            nesting: 0,
            catalog,
        }
    }

    /// 同一份源码上的子范围解析器（块内容）
    pub(crate) fn sub_parser(&self, start: usize, end: usize, line: usize) -> Self {
        Self {
            src: self.src,
            origin: Arc::clone(&self.origin),
            tokens: tokenize_range(self.src, start, end, line),
            pos: 0,
            end: end.min(self.src.len()),
            first_line: line,
            depth: 0,
            nesting: self.nesting,
            catalog: self.catalog,
        }
    }
}
