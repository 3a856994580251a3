//! # Variables 模块
//!
//! `|name|` 变量的取值与替换。
//!
//! ## 查找顺序
//!
//! 1. 函数局部参数（`define-function` 调用时传入）
//! 2. 全局变量
//! 3. 进程环境变量（可在配置中关闭）
//!
//! ## 设计说明
//!
//! - 取值是显式的 [`VariableValue`]，不再从字符串内容猜测类型
//! - 替换是写时复制：不含变量的子树直接共享，只重建到变量的路径
//! - 块内部不在这里替换，执行到块时再按需处理

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::config::ScriptConfig;
use crate::script::element::{Element, ElementError, JsonEntry, Node, check_array_kinds};

/// 变量的取值
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Bool(bool),
    Number(f64),
    Text(String),
    /// 结构化值（数组、对象、null），替换时逐层转换为字面量节点
    Structured(Value),
}

impl VariableValue {
    /// 从 JSON 值构造
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => Self::Number(f),
                None => Self::Text(n.to_string()),
            },
            Value::String(s) => Self::Text(s),
            other => Self::Structured(other),
        }
    }

    /// 作为字符串时的内容
    pub fn as_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
            Self::Structured(v) => v.to_string(),
        }
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Value> for VariableValue {
    fn from(value: Value) -> Self {
        Self::from_json(value)
    }
}

/// 整数值按整数打印，其余按 `f64` 的最短表示
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// 变量来源
pub trait VariableProvider {
    fn get_var(&self, name: &str) -> Option<VariableValue>;
}

impl<S: BuildHasher> VariableProvider for HashMap<String, VariableValue, S> {
    fn get_var(&self, name: &str) -> Option<VariableValue> {
        self.get(name).cloned()
    }
}

impl VariableProvider for serde_json::Map<String, Value> {
    fn get_var(&self, name: &str) -> Option<VariableValue> {
        self.get(name).cloned().map(VariableValue::from_json)
    }
}

/// 一次替换可见的全部变量
#[derive(Clone, Copy)]
pub struct Variables<'a> {
    locals: Option<&'a dyn VariableProvider>,
    globals: Option<&'a dyn VariableProvider>,
    environment: bool,
}

impl Default for Variables<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Variables<'a> {
    /// 没有任何绑定，但会查询环境变量
    pub fn new() -> Self {
        Self {
            locals: None,
            globals: None,
            environment: true,
        }
    }

    /// 按配置决定是否查询环境变量
    pub fn for_config(config: &ScriptConfig) -> Self {
        Self::new().environment(config.environment_fallback)
    }

    pub fn with_globals(mut self, globals: &'a dyn VariableProvider) -> Self {
        self.globals = Some(globals);
        self
    }

    /// 函数局部参数，优先于全局变量
    pub fn with_locals(mut self, locals: &'a dyn VariableProvider) -> Self {
        self.locals = Some(locals);
        self
    }

    pub fn environment(mut self, enabled: bool) -> Self {
        self.environment = enabled;
        self
    }

    pub fn lookup(&self, name: &str) -> Option<VariableValue> {
        self.locals
            .and_then(|p| p.get_var(name))
            .or_else(|| self.globals.and_then(|p| p.get_var(name)))
            .or_else(|| {
                if self.environment {
                    std::env::var(name).ok().map(VariableValue::Text)
                } else {
                    None
                }
            })
    }
}

impl std::fmt::Debug for Variables<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variables")
            .field("locals", &self.locals.is_some())
            .field("globals", &self.globals.is_some())
            .field("environment", &self.environment)
            .finish()
    }
}

/// 替换元素中的全部变量
///
/// `force_string` 为真时所有取值都变成字符串（字典键位置）。
/// 找不到的变量保留为带致命错误的占位节点，兄弟节点照常替换。
pub fn substitute(
    element: &Arc<Element>,
    vars: &Variables<'_>,
    force_string: bool,
) -> Arc<Element> {
    if !element.has_variable() {
        return Arc::clone(element);
    }

    let node = match &element.node {
        Node::Variable(name) => return resolve(element, name, vars, force_string),
        Node::Tuple {
            items,
            trailing_comma,
        } => Node::Tuple {
            items: substitute_all(items, vars, force_string),
            trailing_comma: *trailing_comma,
        },
        Node::Array(items) => {
            let items = substitute_all(items, vars, force_string);
            let mut error = element.error.clone();
            if let Some(mismatch) = check_array_kinds(&items) {
                ElementError::note(&mut error, mismatch);
            }
            let mut rebuilt = element.derive(Node::Array(items));
            rebuilt.error = error;
            return rebuilt.into_arc();
        }
        Node::Json(entries) => Node::Json(
            entries
                .iter()
                .map(|entry| JsonEntry {
                    key: substitute(&entry.key, vars, true),
                    value: entry
                        .value
                        .as_ref()
                        .map(|v| substitute(v, vars, force_string)),
                })
                .collect(),
        ),
        Node::Expression { parts, .. } => Node::Expression {
            parts: substitute_all(parts, vars, force_string),
            resolved: None,
        },
        _ => return Arc::clone(element),
    };

    let mut rebuilt = element.derive(node);
    rebuilt.error = element.error.clone();
    rebuilt.into_arc()
}

fn substitute_all(
    items: &[Arc<Element>],
    vars: &Variables<'_>,
    force_string: bool,
) -> Vec<Arc<Element>> {
    items
        .iter()
        .map(|item| substitute(item, vars, force_string))
        .collect()
}

fn resolve(
    element: &Arc<Element>,
    name: &str,
    vars: &Variables<'_>,
    force_string: bool,
) -> Arc<Element> {
    let Some(value) = vars.lookup(name) else {
        let message = format!("variable `{name}` not found in options nor environment");
        return (**element)
            .clone()
            .with_error(ElementError::fatal(message))
            .into_arc();
    };
    trace!(name, ?value, "substituting variable");

    let node = match value {
        VariableValue::Bool(b) if !force_string => Node::Bool(b),
        VariableValue::Number(n) if !force_string && n.is_finite() => number_node(n),
        VariableValue::Structured(v) if !force_string => {
            let mut replaced = json_element(element, &v);
            if let Some(error) = element.error.clone() {
                ElementError::note(&mut Arc::make_mut(&mut replaced).error, error);
            }
            return replaced;
        }
        other => Node::Str {
            value: other.as_text(),
            quote: '"',
        },
    };

    let mut replaced = element.derive(node);
    replaced.error = element.error.clone();
    replaced.into_arc()
}

fn number_node(n: f64) -> Node {
    let text = format_number(n.abs());
    Node::Number {
        float: text.contains('.'),
        value: text,
        negative: n < 0.0,
    }
}

/// JSON 值直接转换为字面量节点，位置沿用变量所在处
fn json_element(base: &Element, value: &Value) -> Arc<Element> {
    let mut error = None;
    let node = match value {
        Value::Null => Node::Ident("null".to_string()),
        Value::Bool(b) => Node::Bool(*b),
        Value::Number(n) => match n.as_f64().filter(|f| f.is_finite()) {
            Some(f) => number_node(f),
            None => Node::Str {
                value: n.to_string(),
                quote: '"',
            },
        },
        Value::String(s) => Node::Str {
            value: s.clone(),
            quote: '"',
        },
        Value::Array(values) => {
            let items: Vec<_> = values.iter().map(|v| json_element(base, v)).collect();
            error = check_array_kinds(&items);
            Node::Array(items)
        }
        Value::Object(map) => Node::Json(
            map.iter()
                .map(|(key, v)| JsonEntry {
                    key: base
                        .derive(Node::Str {
                            value: key.clone(),
                            quote: '"',
                        })
                        .into_arc(),
                    value: Some(json_element(base, v)),
                })
                .collect(),
        ),
    };
    let mut element = base.derive(node);
    element.error = error;
    element.into_arc()
}
