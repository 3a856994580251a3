//! # Element 模块
//!
//! 脚本参数的抽象语法树节点。
//!
//! ## 设计说明
//!
//! - 节点一经构造即不可变，子节点以 `Arc<Element>` 共享
//! - 缓存中的 AST 可以被多次替换：替换只重建从根到被替换变量的路径，其余子树结构共享
//! - 节点自身的 `error` 只反映它自己的语法；完整的合法性需要遍历全部子节点
//!   （见 [`Element::collect_diagnostics`]）

use std::fmt;
use std::sync::Arc;

use crate::diagnostic::{Diagnostic, DiagnosticResult};
use crate::script::command::CommandNode;
use crate::script::token::{Operator, Span};

/// 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Ident,
    Bool,
    Number,
    String,
    Variable,
    Tuple,
    Array,
    Json,
    Expression,
    Block,
    Operator,
    Char,
    Unknown,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ident => "ident",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Variable => "variable",
            Self::Tuple => "tuple",
            Self::Array => "array",
            Self::Json => "json",
            Self::Expression => "expression",
            Self::Block => "block",
            Self::Operator => "operator",
            Self::Char => "char",
            Self::Unknown => "unknown",
        }
    }

    /// 容器类型
    pub fn is_recursive(self) -> bool {
        matches!(self, Self::Tuple | Self::Array | Self::Json | Self::Block)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 节点自身的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementError {
    pub message: String,
    pub fatal: bool,
}

impl ElementError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
        }
    }

    /// 记录错误：保留第一个错误，但致命错误会覆盖普通错误
    pub fn note(slot: &mut Option<ElementError>, error: ElementError) {
        match slot {
            None => *slot = Some(error),
            Some(existing) if !existing.fatal && error.fatal => *slot = Some(error),
            Some(_) => {}
        }
    }
}

/// 字典条目
#[derive(Debug, Clone, PartialEq)]
pub struct JsonEntry {
    pub key: Arc<Element>,
    pub value: Option<Arc<Element>>,
}

/// 表达式检查后的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// 结果类型
    pub kind: Kind,
    /// 规范化文本
    pub text: String,
    /// 顶层运算符；运行时辅助函数调用等原子结果为 `None`
    pub operator: Option<Operator>,
}

/// 节点内容
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Ident(String),
    Bool(bool),
    /// 数字，`value` 不含符号
    Number {
        value: String,
        negative: bool,
        float: bool,
    },
    /// 字符串，`value` 为去掉转义后的内容
    Str {
        value: String,
        quote: char,
    },
    Variable(String),
    Tuple {
        items: Vec<Arc<Element>>,
        trailing_comma: bool,
    },
    Array(Vec<Arc<Element>>),
    Json(Vec<JsonEntry>),
    /// 表达式：按源码顺序交替排列的操作数与运算符
    Expression {
        parts: Vec<Arc<Element>>,
        resolved: Option<Resolved>,
    },
    /// 块：子命令与原始块文本（不含花括号）
    Block {
        commands: Vec<CommandNode>,
        text: String,
    },
    Operator(Operator),
    Char(char),
    Unknown,
}

/// AST 节点
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub node: Node,
    /// 源码区间
    pub span: Span,
    /// 起始行号
    pub line: usize,
    /// 整段脚本源码，同一次解析产生的节点共享
    origin: Arc<str>,
    pub error: Option<ElementError>,
}

impl Element {
    /// `origin` 是 `span` 所指向的完整源码
    pub fn new(node: Node, span: Span, line: usize, origin: impl Into<Arc<str>>) -> Self {
        Self {
            node,
            span,
            line,
            origin: origin.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: ElementError) -> Self {
        ElementError::note(&mut self.error, error);
        self
    }

    pub fn into_arc(self) -> Arc<Element> {
        Arc::new(self)
    }

    pub fn kind(&self) -> Kind {
        match &self.node {
            Node::Ident(_) => Kind::Ident,
            Node::Bool(_) => Kind::Bool,
            Node::Number { .. } => Kind::Number,
            Node::Str { .. } => Kind::String,
            Node::Variable(_) => Kind::Variable,
            Node::Tuple { .. } => Kind::Tuple,
            Node::Array(_) => Kind::Array,
            Node::Json(_) => Kind::Json,
            Node::Expression { .. } => Kind::Expression,
            Node::Block { .. } => Kind::Block,
            Node::Operator(_) => Kind::Operator,
            Node::Char(_) => Kind::Char,
            Node::Unknown => Kind::Unknown,
        }
    }

    /// 值类型：已检查的表达式取其结果类型，其余等同于 [`Element::kind`]
    pub fn value_kind(&self) -> Kind {
        match &self.node {
            Node::Expression {
                resolved: Some(resolved),
                ..
            } => resolved.kind,
            _ => self.kind(),
        }
    }

    pub fn is_recursive(&self) -> bool {
        self.kind().is_recursive()
    }

    /// 原始源码片段
    pub fn source(&self) -> &str {
        self.origin
            .get(self.span.start..self.span.end)
            .unwrap_or_default()
    }

    /// 规范化文本（诊断与下游重新生成共用）
    pub fn text(&self) -> String {
        self.to_string()
    }

    /// 标量的值文本：字符串不带引号，数字带符号
    pub fn string_value(&self) -> String {
        match &self.node {
            Node::Str { value, .. } => value.clone(),
            Node::Ident(name) => name.clone(),
            Node::Bool(b) => b.to_string(),
            Node::Number {
                value, negative, ..
            } => {
                if *negative {
                    format!("-{value}")
                } else {
                    value.clone()
                }
            }
            _ => self.text(),
        }
    }

    /// 数字的数值
    pub fn number_value(&self) -> Option<f64> {
        match &self.node {
            Node::Number { .. } => self.string_value().parse().ok(),
            _ => None,
        }
    }

    /// 直接子节点（块的子命令不在其中）
    pub fn children(&self) -> Vec<&Arc<Element>> {
        match &self.node {
            Node::Tuple { items, .. } | Node::Array(items) => items.iter().collect(),
            Node::Json(entries) => entries
                .iter()
                .flat_map(|e| std::iter::once(&e.key).chain(e.value.as_ref()))
                .collect(),
            Node::Expression { parts, .. } => parts.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// 是否包含变量（块内部按执行时延迟替换，不计入）
    pub fn has_variable(&self) -> bool {
        matches!(self.node, Node::Variable(_)) || self.children().iter().any(|c| c.has_variable())
    }

    /// 子树中各个块的直接子命令（不继续进入子命令里的块）
    pub fn block_commands(&self) -> Vec<&CommandNode> {
        let mut out = Vec::new();
        self.collect_block_commands(&mut out);
        out
    }

    fn collect_block_commands<'a>(&'a self, out: &mut Vec<&'a CommandNode>) {
        if let Node::Block { commands, .. } = &self.node {
            out.extend(commands);
            return;
        }
        for child in self.children() {
            child.collect_block_commands(out);
        }
    }

    /// 是否包含尚未检查的表达式
    pub fn has_unresolved_expression(&self) -> bool {
        matches!(self.node, Node::Expression { resolved: None, .. })
            || self
                .children()
                .iter()
                .any(|c| c.has_unresolved_expression())
    }

    /// 是否为完全字面量（可以在解析期比较）
    pub fn is_literal(&self) -> bool {
        match &self.node {
            Node::Ident(_) | Node::Bool(_) | Node::Number { .. } | Node::Str { .. } => true,
            Node::Tuple { items, .. } | Node::Array(items) => items.iter().all(|i| i.is_literal()),
            Node::Json(entries) => entries
                .iter()
                .all(|e| e.key.is_literal() && e.value.as_ref().is_some_and(|v| v.is_literal())),
            _ => false,
        }
    }

    /// 自身或任意子节点（含块内命令）带有错误
    pub fn has_errors(&self) -> bool {
        if self.error.is_some() || self.children().iter().any(|c| c.has_errors()) {
            return true;
        }
        match &self.node {
            Node::Block { commands, .. } => commands.iter().any(|c| c.has_errors()),
            _ => false,
        }
    }

    /// 自身或任意子节点带有致命错误
    pub fn has_fatal(&self) -> bool {
        if self.error.as_ref().is_some_and(|e| e.fatal)
            || self.children().iter().any(|c| c.has_fatal())
        {
            return true;
        }
        match &self.node {
            Node::Block { commands, .. } => commands.iter().any(|c| c.has_fatal()),
            _ => false,
        }
    }

    /// 深度遍历收集诊断（先自身，再按源码顺序遍历子节点）
    pub fn collect_diagnostics(&self, out: &mut DiagnosticResult) {
        if let Some(error) = &self.error {
            let diag = if error.fatal {
                Diagnostic::fatal(&error.message)
            } else {
                Diagnostic::error(&error.message)
            };
            out.push(diag.with_line(self.line));
        }
        for child in self.children() {
            child.collect_diagnostics(out);
        }
        if let Node::Block { commands, .. } = &self.node {
            for command in commands {
                command.collect_diagnostics(out);
            }
        }
    }

    /// 以相同位置信息构造一个新节点
    pub fn derive(&self, node: Node) -> Element {
        Element {
            node,
            span: self.span,
            line: self.line,
            origin: Arc::clone(&self.origin),
            error: None,
        }
    }
}

/// 检查数组元素类型是否一致（第一个元素决定类型）
///
/// 变量、未检查的表达式和自身有错的元素跳过，它们的类型要等替换或检查之后才确定。
pub fn check_array_kinds(items: &[Arc<Element>]) -> Option<ElementError> {
    let decided = |e: &&Arc<Element>| {
        e.error.is_none()
            && !matches!(
                e.node,
                Node::Variable(_) | Node::Expression { resolved: None, .. } | Node::Unknown
            )
    };
    let first = items.first().filter(decided)?;
    let expected = first.value_kind();
    items
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, e)| decided(e))
        .find(|(_, e)| e.value_kind() != expected)
        .map(|(pos, e)| {
            ElementError::new(format!(
                "all array's elements must be of the same kind: expected array of `{}` \
                 (because the first element is of this kind), found `{}` at position {}",
                expected,
                e.value_kind(),
                pos
            ))
        })
}

/// 字符串转义：反斜杠与引号前加 `\`，控制字符写成 `\n` / `\t` / `\r` / `\uXXXX`
pub fn escape_string(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => {
                if c == '\\' || c == quote {
                    out.push('\\');
                }
                out.push(c);
            }
        }
    }
    out.push(quote);
    out
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Arc<Element>]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Node::Ident(name) => f.write_str(name),
            Node::Bool(b) => write!(f, "{b}"),
            Node::Number { .. } => f.write_str(&self.string_value()),
            Node::Str { value, quote } => f.write_str(&escape_string(value, *quote)),
            Node::Variable(name) => write!(f, "|{name}|"),
            Node::Tuple {
                items,
                trailing_comma,
            } => {
                f.write_str("(")?;
                write_joined(f, items)?;
                if *trailing_comma && items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Node::Array(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Node::Json(entries) => {
                f.write_str("{")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", entry.key)?;
                    if let Some(value) = &entry.value {
                        write!(f, ": {value}")?;
                    }
                }
                f.write_str("}")
            }
            Node::Expression {
                resolved: Some(resolved),
                ..
            } => f.write_str(&resolved.text),
            Node::Expression { parts, .. } => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Node::Block { text, .. } => write!(f, "block {{{text}}}"),
            Node::Operator(op) => f.write_str(op.as_str()),
            Node::Char(c) => write!(f, "{c}"),
            Node::Unknown => f.write_str(self.source()),
        }
    }
}
