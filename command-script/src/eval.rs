//! # Eval 模块
//!
//! 表达式类型检查与文本重建。
//!
//! ## 类型规则
//!
//! | 运算符 | 操作数 | 结果 |
//! |---|---|---|
//! | `+` | number + number | number |
//! | `+` | 任一侧为 string（另一侧 number/string） | string（拼接） |
//! | `- * /` | number | number |
//! | `< <= > >=` | number | boolean |
//! | `&& \|\|` | boolean | boolean |
//! | `== !=` | 两侧同类型 | boolean |
//!
//! ## 折叠
//!
//! - 数值运算不求值，只重建规范文本（下游目标在运行时计算）
//! - 两侧都是字面量的字符串拼接折叠为字符串字面量
//! - 两侧都是字面量的元组/数组/字典相等比较折叠为布尔字面量；
//!   否则改写为运行时辅助函数调用
//!
//! 运算严格从左到右结合；重建文本时按下游语言的优先级补括号，保持这一结合顺序。

use std::sync::Arc;

use tracing::trace;

use crate::config::ScriptConfig;
use crate::script::element::{
    Element, ElementError, JsonEntry, Kind, Node, Resolved, check_array_kinds,
};
use crate::script::token::Operator;

/// 检查元素内的全部表达式
///
/// 已带错误或仍含变量的表达式保持原样：它们的错误已经报告过，
/// 或者要等替换之后才能检查。
pub fn evaluate(element: &Arc<Element>, config: &ScriptConfig) -> Arc<Element> {
    if !element.has_unresolved_expression() {
        return Arc::clone(element);
    }

    let node = match &element.node {
        Node::Tuple {
            items,
            trailing_comma,
        } => Node::Tuple {
            items: evaluate_all(items, config),
            trailing_comma: *trailing_comma,
        },
        Node::Array(items) => {
            let items = evaluate_all(items, config);
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
                    key: evaluate(&entry.key, config),
                    value: entry.value.as_ref().map(|v| evaluate(v, config)),
                })
                .collect(),
        ),
        Node::Expression {
            parts,
            resolved: None,
        } => return evaluate_expression(element, parts, config),
        _ => return Arc::clone(element),
    };

    let mut rebuilt = element.derive(node);
    rebuilt.error = element.error.clone();
    rebuilt.into_arc()
}

fn evaluate_all(items: &[Arc<Element>], config: &ScriptConfig) -> Vec<Arc<Element>> {
    items.iter().map(|item| evaluate(item, config)).collect()
}

/// 折叠过程中的一个操作数
#[derive(Debug, Clone)]
struct Operand {
    kind: Kind,
    text: String,
    /// 顶层运算符，决定与外层组合时是否需要括号
    op: Option<Operator>,
    /// 字面量值（标量或完全字面量的容器）
    value: Option<Arc<Element>>,
}

impl Operand {
    fn from_element(element: &Arc<Element>) -> Self {
        match &element.node {
            // 单元素且无尾逗号的元组是括号分组
            Node::Tuple {
                items,
                trailing_comma: false,
            } if items.len() == 1 => Self::from_element(&items[0]),
            Node::Expression {
                resolved: Some(resolved),
                ..
            } => Self {
                kind: resolved.kind,
                text: resolved.text.clone(),
                op: resolved.operator,
                value: None,
            },
            _ => Self {
                kind: element.value_kind(),
                text: element.text(),
                op: None,
                value: element.is_literal().then(|| Arc::clone(element)),
            },
        }
    }

    fn computed(kind: Kind, text: String, op: Option<Operator>) -> Self {
        Self {
            kind,
            text,
            op,
            value: None,
        }
    }

    fn literal(base: &Element, node: Node) -> Self {
        let element = base.derive(node).into_arc();
        Self {
            kind: element.kind(),
            text: element.text(),
            op: None,
            value: Some(element),
        }
    }

    /// 作为拼接参与者时的字符串值
    fn scalar_value(&self) -> Option<String> {
        self.value
            .as_ref()
            .filter(|v| matches!(v.kind(), Kind::String | Kind::Number))
            .map(|v| v.string_value())
    }

    fn as_left(&self, op: Operator) -> String {
        match self.op {
            Some(inner) if inner.precedence() < op.precedence() => format!("({})", self.text),
            _ => self.text.clone(),
        }
    }

    fn as_right(&self, op: Operator) -> String {
        match self.op {
            Some(inner) if inner.precedence() <= op.precedence() => format!("({})", self.text),
            _ => self.text.clone(),
        }
    }
}

fn evaluate_expression(
    element: &Arc<Element>,
    parts: &[Arc<Element>],
    config: &ScriptConfig,
) -> Arc<Element> {
    if element.has_errors() || element.has_variable() {
        return Arc::clone(element);
    }

    let parts = evaluate_all(parts, config);
    let rebuild = |error: Option<ElementError>, resolved: Option<Resolved>| {
        let mut rebuilt = element.derive(Node::Expression {
            parts: parts.clone(),
            resolved,
        });
        rebuilt.error = error;
        rebuilt.into_arc()
    };

    if parts.iter().any(|p| p.has_errors()) {
        return rebuild(None, None);
    }

    let Some(first) = parts.first() else {
        return rebuild(None, None);
    };
    let mut acc = Operand::from_element(first);
    for pair in parts[1..].chunks(2) {
        let [op, rhs] = pair else {
            return rebuild(None, None);
        };
        let Node::Operator(op) = op.node else {
            return rebuild(None, None);
        };
        let rhs = Operand::from_element(rhs);
        acc = match combine(element, acc, op, rhs, config) {
            Ok(folded) => folded,
            Err(error) => return rebuild(Some(error), None),
        };
    }

    trace!(text = %acc.text, kind = %acc.kind, "evaluated expression");
    match acc.value {
        Some(literal) => literal,
        None => rebuild(
            None,
            Some(Resolved {
                kind: acc.kind,
                text: acc.text,
                operator: acc.op,
            }),
        ),
    }
}

/// 类型不允许时的错误，指明出错的操作数文本与类型
fn bad_operand(op: Operator, operand: &Operand, allowed: &str) -> ElementError {
    ElementError::new(format!(
        "cannot use `{op}` on `{}` which is a `{}`: only {allowed} are allowed",
        operand.text, operand.kind
    ))
}

/// 两侧中第一个类型不在 `allowed` 中的操作数
fn offending<'a>(lhs: &'a Operand, rhs: &'a Operand, allowed: &[Kind]) -> Option<&'a Operand> {
    [lhs, rhs].into_iter().find(|o| !allowed.contains(&o.kind))
}

fn combine(
    base: &Element,
    lhs: Operand,
    op: Operator,
    rhs: Operand,
    config: &ScriptConfig,
) -> Result<Operand, ElementError> {
    let text = format!("{} {op} {}", lhs.as_left(op), rhs.as_right(op));

    match op {
        Operator::Add => {
            if let Some(bad) = offending(&lhs, &rhs, &[Kind::Number, Kind::String]) {
                return Err(bad_operand(op, bad, "numbers and strings"));
            }
            if lhs.kind == Kind::Number && rhs.kind == Kind::Number {
                return Ok(Operand::computed(Kind::Number, text, Some(op)));
            }
            match (lhs.scalar_value(), rhs.scalar_value()) {
                (Some(a), Some(b)) => Ok(Operand::literal(
                    base,
                    Node::Str {
                        value: a + &b,
                        quote: '"',
                    },
                )),
                _ => Ok(Operand::computed(Kind::String, text, Some(op))),
            }
        }
        Operator::Sub | Operator::Mul | Operator::Div => {
            if let Some(bad) = offending(&lhs, &rhs, &[Kind::Number]) {
                return Err(bad_operand(op, bad, "numbers"));
            }
            Ok(Operand::computed(Kind::Number, text, Some(op)))
        }
        Operator::Lt | Operator::LtEq | Operator::Gt | Operator::GtEq => {
            if let Some(bad) = offending(&lhs, &rhs, &[Kind::Number]) {
                return Err(bad_operand(op, bad, "numbers"));
            }
            Ok(Operand::computed(Kind::Bool, text, Some(op)))
        }
        Operator::And | Operator::Or => {
            if let Some(bad) = offending(&lhs, &rhs, &[Kind::Bool]) {
                return Err(bad_operand(op, bad, "booleans"));
            }
            Ok(Operand::computed(Kind::Bool, text, Some(op)))
        }
        Operator::Eq | Operator::NotEq => {
            if lhs.kind != rhs.kind {
                return Err(ElementError::new(format!(
                    "cannot compare `{}` (`{}`) with `{}` (`{}`): both sides must be of the same kind",
                    lhs.text, lhs.kind, rhs.text, rhs.kind
                )));
            }
            if !matches!(lhs.kind, Kind::Tuple | Kind::Array | Kind::Json) {
                return Ok(Operand::computed(Kind::Bool, text, Some(op)));
            }

            let negate = op == Operator::NotEq;
            if let (Some(a), Some(b)) = (&lhs.value, &rhs.value) {
                let equal = if lhs.kind == Kind::Json {
                    loose_eq(a, b)
                } else {
                    strict_eq(a, b)
                };
                return Ok(Operand::literal(base, Node::Bool(equal != negate)));
            }

            let helper = if lhs.kind == Kind::Json {
                &config.json_helper
            } else {
                &config.array_helper
            };
            let call = format!(
                "{}{helper}({}, {})",
                if negate { "!" } else { "" },
                lhs.text,
                rhs.text
            );
            Ok(Operand::computed(Kind::Bool, call, None))
        }
    }
}

/// 元组/数组：长度、类型、值逐项相等，且顺序一致
fn strict_eq(a: &Element, b: &Element) -> bool {
    if a.kind() != b.kind() {
        return false;
    }
    match (&a.node, &b.node) {
        (Node::Tuple { items: x, .. }, Node::Tuple { items: y, .. })
        | (Node::Array(x), Node::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| strict_eq(l, r))
        }
        (Node::Json(x), Node::Json(y)) => {
            x.len() == y.len()
                && x.iter().zip(y).all(|(l, r)| {
                    strict_eq(&l.key, &r.key)
                        && match (&l.value, &r.value) {
                            (Some(lv), Some(rv)) => strict_eq(lv, rv),
                            (None, None) => true,
                            _ => false,
                        }
                })
        }
        (Node::Number { .. }, Node::Number { .. }) => a.number_value() == b.number_value(),
        _ => a.string_value() == b.string_value(),
    }
}

/// 字典：键集合相同，值按字符串值比较（`1` 与 `"1"` 相等），不看顺序
fn loose_eq(a: &Element, b: &Element) -> bool {
    match (&a.node, &b.node) {
        (Node::Json(x), Node::Json(y)) => {
            x.len() == y.len()
                && x.iter().all(|l| {
                    let key = l.key.string_value();
                    y.iter()
                        .find(|r| r.key.string_value() == key)
                        .is_some_and(|r| match (&l.value, &r.value) {
                            (Some(lv), Some(rv)) => loose_eq(lv, rv),
                            (None, None) => true,
                            _ => false,
                        })
                })
        }
        _ => a.string_value() == b.string_value(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_element;

    fn eval(text: &str) -> Arc<Element> {
        evaluate(&parse_element(text), &ScriptConfig::default())
    }

    fn error_of(element: &Element) -> String {
        element
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_arithmetic_is_not_folded() {
        let element = eval("1 + 1");
        assert_eq!(element.text(), "1 + 1");
        assert_eq!(element.value_kind(), Kind::Number);
        assert!(!element.has_errors());
    }

    #[test]
    fn test_string_concatenation() {
        let element = eval("\"a\" + 1");
        assert_eq!(element.kind(), Kind::String);
        assert_eq!(element.string_value(), "a1");

        let element = eval("\"a\" + 'b' + \"c\"");
        assert_eq!(element.text(), "\"abc\"");
    }

    #[test]
    fn test_invalid_addition() {
        let element = eval("1 + true");
        assert_eq!(
            error_of(&element),
            "cannot use `+` on `true` which is a `boolean`: only numbers and strings are allowed"
        );
        assert!(!element.has_fatal());

        let element = eval("[1] + 2");
        assert!(error_of(&element).contains("`[1]` which is a `array`"));
    }

    #[test]
    fn test_numeric_operators() {
        assert_eq!(eval("4 / 2 * 3").text(), "4 / 2 * 3");
        assert!(error_of(&eval("\"a\" - 1")).contains("only numbers are allowed"));
        assert_eq!(eval("1 < 2").value_kind(), Kind::Bool);
        assert!(error_of(&eval("\"a\" >= 1")).contains("`\"a\"` which is a `string`"));
    }

    #[test]
    fn test_logical_operators() {
        let element = eval("true && false || true");
        assert_eq!(element.value_kind(), Kind::Bool);
        assert_eq!(element.text(), "true && false || true");
        assert!(error_of(&eval("true && 1")).contains("only booleans are allowed"));
    }

    #[test]
    fn test_equality_kinds_must_match() {
        let element = eval("1 == \"1\"");
        assert_eq!(
            error_of(&element),
            "cannot compare `1` (`number`) with `\"1\"` (`string`): both sides must be of the same kind"
        );
        let element = eval("1 == 1");
        assert_eq!(element.value_kind(), Kind::Bool);
        assert_eq!(element.text(), "1 == 1");
    }

    #[test]
    fn test_structural_equality_folds() {
        let element = eval("[1, 2] == [1, 2]");
        assert_eq!(element.node, Node::Bool(true));

        assert_eq!(eval("[1, 2] != [2, 1]").node, Node::Bool(true));
        assert_eq!(eval("(1, \"a\") == (1, \"a\")").node, Node::Bool(true));
        assert_eq!(eval("[1, 2] == [1]").node, Node::Bool(false));
        // 字典比较不看顺序，值按字符串比较
        let element = eval("{\"a\": 1, \"b\": 2} == {\"b\": \"2\", \"a\": 1}");
        assert_eq!(element.node, Node::Bool(true));
        // 数组比较严格区分类型
        assert_eq!(eval("[\"1\"] == [\"1\"]").node, Node::Bool(true));
    }

    #[test]
    fn test_structural_equality_helper_call() {
        let element = eval("[1 + 1] == [2]");
        assert_eq!(element.kind(), Kind::Expression);
        assert_eq!(element.text(), "compareArrayLike([1 + 1], [2])");

        let config = ScriptConfig {
            json_helper: "deepEqual".to_string(),
            ..ScriptConfig::default()
        };
        let element = evaluate(&parse_element("{\"a\": 1 + 1} != {\"a\": 2}"), &config);
        assert_eq!(element.text(), "!deepEqual({\"a\": 1 + 1}, {\"a\": 2})");
    }

    #[test]
    fn test_left_to_right_with_parentheses() {
        // 从左到右结合：(1 + 2) * 3
        assert_eq!(eval("1 + 2 * 3").text(), "(1 + 2) * 3");
        assert_eq!(eval("1 - (2 - 3)").text(), "1 - (2 - 3)");
        assert_eq!(eval("(1 * 2) + 3").text(), "1 * 2 + 3");
        assert_eq!(eval("1 < 2 == true").text(), "1 < 2 == true");
        assert_eq!(eval("true || false && true").text(), "(true || false) && true");
    }

    #[test]
    fn test_nested_expressions_in_containers() {
        let element = eval("(1 + 2, [\"a\" + \"b\"])");
        assert_eq!(element.text(), "(1 + 2, [\"ab\"])");
        assert!(!element.has_unresolved_expression());

        let element = eval("[1 + 2, \"a\"]");
        assert!(error_of(&element).contains("found `string` at position 1"));
    }

    #[test]
    fn test_expressions_with_errors_are_skipped() {
        let parsed = parse_element("1 - - 2");
        let element = evaluate(&parsed, &ScriptConfig::default());
        assert!(Arc::ptr_eq(&parsed, &element));

        let parsed = parse_element("|x| + 1");
        let element = evaluate(&parsed, &ScriptConfig::default());
        assert!(Arc::ptr_eq(&parsed, &element));
    }
}
