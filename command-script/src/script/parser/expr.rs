//! # 运算符链
//!
//! 操作数与二元运算符交替出现时构成表达式。解析阶段只记录扁平序列，
//! 类型检查与折叠在 [`crate::eval`] 中完成。

use std::sync::Arc;

use super::ElementParser;
use crate::script::element::{Element, ElementError, Node};
use crate::script::token::{Span, TokenKind};

impl ElementParser<'_> {
    /// 解析一个元素：单个操作数，或者由运算符连接的表达式
    pub(super) fn parse_element(&mut self) -> Arc<Element> {
        let first = self.parse_operand();
        if !self.peek_operator() {
            return first;
        }

        let start = first.span.start;
        let line = first.line;
        let mut parts = vec![first];
        let mut error = None;

        while self.peek_operator() {
            let Some(token) = self.bump() else { break };
            let TokenKind::Operator(op) = token.kind else { break };
            parts.push(self.element(Node::Operator(op), token.span, token.line).into_arc());

            // 运算符之后的 `-` 不作为符号
            self.skip_trivia();
            if let Some(TokenKind::Operator(next)) = self.current_kind().cloned() {
                let message = format!("unexpected `{next}` after `{op}`");
                ElementError::note(&mut error, ElementError::new(message));
                self.bump();
                self.skip_trivia();
            }

            if !self.starts_operand() {
                let message = format!("expected an element after `{op}`");
                ElementError::note(&mut error, ElementError::new(message));
                break;
            }
            parts.push(self.parse_operand());
        }

        let end = self.last_end(start);
        let node = Node::Expression {
            parts,
            resolved: None,
        };
        let mut element = self.element(node, Span::new(start, end), line);
        element.error = error;
        element.into_arc()
    }

    /// 跳过注释（括号内还有换行）后，当前 token 是否为运算符
    fn peek_operator(&mut self) -> bool {
        self.skip_trivia();
        matches!(self.current_kind(), Some(TokenKind::Operator(_)))
    }
}
