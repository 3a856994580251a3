//! # 标量字面量
//!
//! 字符串、数字（含负号）、布尔、标识符与 `|name|` 变量。

use std::sync::Arc;

use super::ElementParser;
use crate::script::element::{Element, ElementError, Node};
use crate::script::token::{LexError, Operator, Token, TokenKind};

fn lex_error(error: &LexError) -> ElementError {
    if error.is_fatal() {
        ElementError::fatal(error.to_string())
    } else {
        ElementError::new(error.to_string())
    }
}

impl ElementParser<'_> {
    /// 解析一个操作数（不含运算符链）
    pub(super) fn parse_operand(&mut self) -> Arc<Element> {
        self.skip_trivia();
        let Some(token) = self.current().cloned() else {
            return self.missing_element("expected an element, found end of input".to_string());
        };

        match &token.kind {
            TokenKind::Str { value, quote } => {
                self.bump();
                let node = Node::Str {
                    value: value.clone(),
                    quote: *quote,
                };
                self.scalar(node, &token)
            }
            TokenKind::Number { float } => {
                self.bump();
                let node = Node::Number {
                    value: self.slice(token.span).to_string(),
                    negative: false,
                    float: *float,
                };
                self.scalar(node, &token)
            }
            TokenKind::Operator(Operator::Sub) => self.parse_negative_number(token.clone()),
            TokenKind::Bool(b) => {
                self.bump();
                self.scalar(Node::Bool(*b), &token)
            }
            TokenKind::Ident => {
                if self.slice(token.span) == "block" && self.block_follows() {
                    return self.nested(Self::parse_block);
                }
                self.bump();
                let node = Node::Ident(self.slice(token.span).to_string());
                self.scalar(node, &token)
            }
            TokenKind::Pipe => self.parse_variable(),
            TokenKind::LParen => self.nested(Self::parse_tuple),
            TokenKind::LBracket => self.nested(Self::parse_array),
            TokenKind::LBrace => self.nested(Self::parse_json),
            TokenKind::Operator(op) => {
                self.bump();
                self.element(Node::Operator(*op), token.span, token.line)
                    .with_error(ElementError::new(format!("unexpected operator `{op}`")))
                    .into_arc()
            }
            TokenKind::Newline | TokenKind::Comment => {
                self.missing_element("expected an element, found newline".to_string())
            }
            TokenKind::Unknown(c) => {
                self.bump();
                self.element(Node::Char(*c), token.span, token.line)
                    .with_error(ElementError::new(format!("unexpected character `{c}`")))
                    .into_arc()
            }
            TokenKind::RParen
            | TokenKind::RBracket
            | TokenKind::RBrace
            | TokenKind::Comma
            | TokenKind::Colon => {
                self.bump();
                let text = self.slice(token.span);
                let c = text.chars().next().unwrap_or_default();
                self.element(Node::Char(c), token.span, token.line)
                    .with_error(ElementError::new(format!("unexpected `{text}`")))
                    .into_arc()
            }
        }
    }

    /// 由单个 token 构成的标量，携带该 token 的词法错误
    fn scalar(&self, node: Node, token: &Token) -> Arc<Element> {
        let mut element = self.element(node, token.span, token.line);
        if let Some(error) = &token.error {
            element = element.with_error(lex_error(error));
        }
        element.into_arc()
    }

    /// `-` 紧贴数字时作为符号
    fn parse_negative_number(&mut self, minus: Token) -> Arc<Element> {
        self.bump();
        let number = match self.current() {
            Some(next)
                if matches!(next.kind, TokenKind::Number { .. })
                    && next.span.start == minus.span.end =>
            {
                next.clone()
            }
            _ => {
                return self
                    .element(Node::Operator(Operator::Sub), minus.span, minus.line)
                    .with_error(ElementError::new("expected a number after `-`"))
                    .into_arc();
            }
        };
        self.bump();

        let span = minus.span.merge(number.span);
        let mut element = self.element(
            Node::Number {
                value: self.slice(number.span).to_string(),
                negative: true,
                float: matches!(number.kind, TokenKind::Number { float: true }),
            },
            span,
            minus.line,
        );
        if let Some(error) = &number.error {
            element = element.with_error(lex_error(error));
        }
        element.into_arc()
    }

    /// `block` 之后（可跨注释与换行）紧跟 `{`
    fn block_follows(&self) -> bool {
        self.tokens[self.pos + 1..]
            .iter()
            .find(|t| !matches!(t.kind, TokenKind::Comment | TokenKind::Newline))
            .is_some_and(|t| t.kind == TokenKind::LBrace)
    }

    /// `|name|`
    fn parse_variable(&mut self) -> Arc<Element> {
        let Some(open) = self.bump() else {
            return self.missing_element("expected a variable".to_string());
        };

        let name = match self.current() {
            Some(t) if matches!(t.kind, TokenKind::Ident | TokenKind::Bool(_)) => t.clone(),
            _ => {
                return self
                    .element(Node::Char('|'), open.span, open.line)
                    .with_error(ElementError::new("expected a variable name after `|`"))
                    .into_arc();
            }
        };
        self.bump();
        let var_name = self.slice(name.span).to_string();

        match self.current() {
            Some(close) if close.kind == TokenKind::Pipe => {
                let span = open.span.merge(close.span);
                self.bump();
                self.element(Node::Variable(var_name), span, open.line)
                    .into_arc()
            }
            _ => {
                let span = open.span.merge(name.span);
                let message = format!("missing `|` after variable name `{var_name}`");
                self.element(Node::Variable(var_name), span, open.line)
                    .with_error(ElementError::new(message))
                    .into_arc()
            }
        }
    }
}
