//! # 诊断模块
//!
//! 解析、变量替换与表达式检查产生的诊断记录。
//!
//! ## 设计原则
//!
//! - 诊断是数据而不是 `Err`：一个文件的全部问题一次性产出
//! - 诊断分两级：普通错误（继续解析）与致命错误（停止消费当前命令/脚本）
//! - 行号从 1 开始，无法定位时为 `None`

use std::fmt;

/// 诊断条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 诊断消息
    pub message: String,
    /// 是否致命
    pub fatal: bool,
    /// 行号（如果可定位，从 1 开始）
    pub line: Option<usize>,
    /// 诊断详情（可选，如出错的源码片段）
    pub detail: Option<String>,
}

impl Diagnostic {
    /// 创建普通错误
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
            line: None,
            detail: None,
        }
    }

    /// 创建致命错误
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            fatal: true,
            ..Self::error(message)
        }
    }

    /// 设置行号
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// 设置详情
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.fatal { "FATAL" } else { "ERROR" };
        write!(f, "[{level}]")?;
        if let Some(line) = self.line {
            write!(f, " line {line}")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n  | {detail}")?;
        }
        Ok(())
    }
}

/// 诊断结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticResult {
    /// 诊断条目列表（按产生顺序）
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// 合并另一个结果
    pub fn merge(&mut self, other: DiagnosticResult) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// 错误总数（含致命错误）
    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    /// 致命错误数量
    pub fn fatal_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.fatal).count()
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn has_fatal(&self) -> bool {
        self.diagnostics.iter().any(|d| d.fatal)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    /// 只保留致命错误
    pub fn fatal_only(&self) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.fatal).collect()
    }
}

impl<'a> IntoIterator for &'a DiagnosticResult {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.iter()
    }
}

impl Extend<Diagnostic> for DiagnosticResult {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.diagnostics.extend(iter);
    }
}
