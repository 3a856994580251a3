//! # Command 模块
//!
//! 单条命令（`name: argument`）的节点与命令名目录。

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ScriptConfig;
use crate::diagnostic::{Diagnostic, DiagnosticResult};
use crate::eval::evaluate;
use crate::script::element::{Element, ElementError};
use crate::script::token::Span;
use crate::variables::{Variables, substitute};

/// 命令节点
///
/// 每次解析对每条语句只创建一次；`clone()` 得到独立副本，
/// 同一份缓存的命令可以被反复替换（循环、重复进入的块）而互不影响。
#[derive(Debug, Clone, PartialEq)]
pub struct CommandNode {
    /// 命令名
    pub name: String,
    /// 行号（从 1 开始）
    pub line: usize,
    /// 参数（`reload:` 这类命令没有参数）
    pub argument: Option<Arc<Element>>,
    /// 参数中是否含有 `|name|` 变量
    pub has_variable: bool,
    /// 整条命令的源码区间
    pub span: Span,
    /// 整条命令的源码文本
    pub text: String,
    /// 命令级别的错误（未知命令、缺少 `:`、参数后多余内容）
    pub error: Option<ElementError>,
}

impl CommandNode {
    pub fn new(
        name: impl Into<String>,
        line: usize,
        argument: Option<Arc<Element>>,
        span: Span,
        text: impl Into<String>,
    ) -> Self {
        let has_variable = argument.as_ref().is_some_and(|a| a.has_variable());
        Self {
            name: name.into(),
            line,
            argument,
            has_variable,
            span,
            text: text.into(),
            error: None,
        }
    }

    /// 参数的规范化文本
    pub fn argument_text(&self) -> String {
        self.argument
            .as_ref()
            .map(|a| a.text())
            .unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        self.error.is_some() || self.argument.as_ref().is_some_and(|a| a.has_errors())
    }

    pub fn has_fatal(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.fatal)
            || self.argument.as_ref().is_some_and(|a| a.has_fatal())
    }

    /// 收集本命令（含参数全部子节点）的诊断
    pub fn collect_diagnostics(&self, out: &mut DiagnosticResult) {
        if let Some(error) = &self.error {
            let diag = if error.fatal {
                Diagnostic::fatal(&error.message)
            } else {
                Diagnostic::error(&error.message)
            };
            out.push(diag.with_line(self.line).with_detail(self.text.trim()));
        }
        if let Some(argument) = &self.argument {
            argument.collect_diagnostics(out);
        }
    }

    pub fn diagnostics(&self) -> DiagnosticResult {
        let mut out = DiagnosticResult::new();
        self.collect_diagnostics(&mut out);
        out
    }

    /// 以新的参数构造副本
    pub fn with_argument(&self, argument: Option<Arc<Element>>) -> Self {
        Self {
            has_variable: argument.as_ref().is_some_and(|a| a.has_variable()),
            argument,
            ..self.clone()
        }
    }

    /// 执行前准备：变量替换后检查表达式
    ///
    /// 不含变量与表达式的命令直接共享原参数。
    pub fn prepare(&self, vars: &Variables<'_>, config: &ScriptConfig) -> Prepared {
        let argument = self.argument.as_ref().map(|arg| {
            let substituted = substitute(arg, vars, false);
            evaluate(&substituted, config)
        });
        let command = self.with_argument(argument);
        let diagnostics = command.diagnostics();
        Prepared {
            command,
            diagnostics,
        }
    }

    /// 参数中各个块的直接子命令
    pub fn block_commands(&self) -> Vec<&CommandNode> {
        self.argument
            .as_ref()
            .map(|a| a.block_commands())
            .unwrap_or_default()
    }

    /// 静态检查：解析诊断，加上不含变量的命令（包括块内子命令）的表达式检查
    ///
    /// 块内含变量的子命令要等调用时才知道取值，只报告解析诊断。
    pub fn check(&self, vars: &Variables<'_>, config: &ScriptConfig) -> DiagnosticResult {
        let mut out = if self.has_variable {
            self.diagnostics()
        } else {
            self.prepare(vars, config).diagnostics
        };
        // 块内的解析诊断已经随本命令收集，这里只补充无错子命令的检查结果
        for sub in self.block_commands() {
            if !sub.has_variable && !sub.has_errors() {
                out.merge(sub.check(vars, config));
            }
        }
        out
    }
}

/// 准备好的命令
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub command: CommandNode,
    pub diagnostics: DiagnosticResult,
}

impl Prepared {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// 命令名目录
///
/// 解析器据此判断命令名是否合法；未知命令是致命错误。
pub trait CommandCatalog {
    fn contains(&self, name: &str) -> bool;
}

/// 接受任意命令名
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyCommand;

impl CommandCatalog for AnyCommand {
    fn contains(&self, _name: &str) -> bool {
        true
    }
}

/// 固定的命令名集合
#[derive(Debug, Clone, Default)]
pub struct KnownCommands {
    names: HashSet<String>,
}

impl KnownCommands {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl CommandCatalog for KnownCommands {
    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// 内置的浏览器 UI 测试命令名
pub const BUILTIN_COMMANDS: &[&str] = &[
    "assert",
    "assert-false",
    "assert-attribute",
    "assert-attribute-false",
    "assert-css",
    "assert-css-false",
    "assert-count",
    "assert-count-false",
    "assert-document-property",
    "assert-document-property-false",
    "assert-local-storage",
    "assert-local-storage-false",
    "assert-position",
    "assert-position-false",
    "assert-property",
    "assert-property-false",
    "assert-size",
    "assert-size-false",
    "assert-text",
    "assert-text-false",
    "assert-variable",
    "assert-variable-false",
    "assert-window-property",
    "assert-window-property-false",
    "call-function",
    "click",
    "click-with-offset",
    "compare-elements-attribute",
    "compare-elements-css",
    "compare-elements-position",
    "compare-elements-property",
    "compare-elements-size",
    "compare-elements-text",
    "debug",
    "define-function",
    "drag-and-drop",
    "emulate",
    "expect-failure",
    "fail-on-js-error",
    "fail-on-request-error",
    "focus",
    "geolocation",
    "go-to",
    "history-go-back",
    "history-go-forward",
    "include",
    "javascript",
    "move-cursor-to",
    "pause-on-error",
    "permissions",
    "press-key",
    "reload",
    "screenshot",
    "screenshot-comparison",
    "screenshot-on-failure",
    "scroll-to",
    "set-attribute",
    "set-css",
    "set-device-pixel-ratio",
    "set-font-size",
    "set-local-storage",
    "set-property",
    "set-text",
    "set-timeout",
    "set-window-size",
    "show-text",
    "store-attribute",
    "store-css",
    "store-document-property",
    "store-local-storage",
    "store-position",
    "store-property",
    "store-size",
    "store-text",
    "store-value",
    "store-window-property",
    "wait-for",
    "wait-for-attribute",
    "wait-for-count",
    "wait-for-css",
    "wait-for-document-property",
    "wait-for-false",
    "wait-for-local-storage",
    "wait-for-position",
    "wait-for-property",
    "wait-for-size",
    "wait-for-text",
    "wait-for-window-property",
    "write",
    "write-into",
];
