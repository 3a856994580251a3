//! # 容器字面量
//!
//! 元组 `(...)`、数组 `[...]`、字典 `{...}` 与块 `block { ... }`。

use std::sync::Arc;

use super::ElementParser;
use crate::script::element::{Element, ElementError, JsonEntry, Kind, Node, check_array_kinds};
use crate::script::token::{Span, TokenKind};

/// 逗号分隔序列的解析结果
struct Sequence {
    items: Vec<Arc<Element>>,
    trailing_comma: bool,
    error: Option<ElementError>,
    span: Span,
    line: usize,
}

/// 字典的键必须是字符串（变量在替换时强制为字符串）
fn key_error(key: &Element) -> Option<ElementError> {
    if key.error.is_some() {
        return None;
    }
    match key.kind() {
        Kind::String | Kind::Variable => None,
        kind => Some(ElementError::new(format!(
            "only strings can be used as keys in JSON dict, found `{}` (`{}`)",
            kind,
            key.text()
        ))),
    }
}

impl ElementParser<'_> {
    pub(super) fn parse_tuple(&mut self) -> Arc<Element> {
        let seq = self.parse_sequence(TokenKind::RParen, ')', "tuple");
        let mut element = self.element(
            Node::Tuple {
                items: seq.items,
                trailing_comma: seq.trailing_comma,
            },
            seq.span,
            seq.line,
        );
        element.error = seq.error;
        element.into_arc()
    }

    pub(super) fn parse_array(&mut self) -> Arc<Element> {
        let seq = self.parse_sequence(TokenKind::RBracket, ']', "array");
        let mut error = seq.error;
        if let Some(mismatch) = check_array_kinds(&seq.items) {
            ElementError::note(&mut error, mismatch);
        }
        let mut element = self.element(Node::Array(seq.items), seq.span, seq.line);
        element.error = error;
        element.into_arc()
    }

    fn parse_sequence(&mut self, closer: TokenKind, close: char, what: &str) -> Sequence {
        let (start, line) = match self.bump() {
            Some(open) => (open.span.start, open.line),
            None => (self.end, self.current_line()),
        };
        self.depth += 1;

        let mut items = Vec::new();
        let mut error = None;
        let mut expect_item = true;
        let end = loop {
            self.skip_trivia();
            let Some(token) = self.current().cloned() else {
                let message = format!("missing `{close}` to close {what}");
                ElementError::note(&mut error, ElementError::fatal(message));
                break self.end;
            };

            if token.kind == closer {
                self.bump();
                break token.span.end;
            }

            match token.kind {
                TokenKind::Comma => {
                    if expect_item {
                        let message = format!("unexpected `,` in {what}");
                        ElementError::note(&mut error, ElementError::new(message));
                    }
                    expect_item = true;
                    self.bump();
                }
                ref kind if kind.is_closer() || *kind == TokenKind::Colon => {
                    let message = format!("unexpected `{}` in {what}", self.describe(&token));
                    ElementError::note(&mut error, ElementError::new(message));
                    self.bump();
                }
                _ => {
                    if !expect_item {
                        let message = format!(
                            "expected `,` or `{close}` in {what}, found `{}`",
                            self.describe(&token)
                        );
                        ElementError::note(&mut error, ElementError::new(message));
                    }
                    items.push(self.parse_element());
                    expect_item = false;
                }
            }
        };

        self.depth -= 1;
        Sequence {
            trailing_comma: expect_item && !items.is_empty(),
            items,
            error,
            span: Span::new(start, end),
            line,
        }
    }

    pub(super) fn parse_json(&mut self) -> Arc<Element> {
        let (start, line) = match self.bump() {
            Some(open) => (open.span.start, open.line),
            None => (self.end, self.current_line()),
        };
        self.depth += 1;

        let mut entries = Vec::new();
        let mut error = None;
        let mut expect_entry = true;
        let end = loop {
            self.skip_trivia();
            let Some(token) = self.current().cloned() else {
                ElementError::note(
                    &mut error,
                    ElementError::fatal("missing `}` to close json"),
                );
                break self.end;
            };

            match token.kind {
                TokenKind::RBrace => {
                    self.bump();
                    break token.span.end;
                }
                TokenKind::Comma => {
                    if expect_entry {
                        ElementError::note(&mut error, ElementError::new("unexpected `,` in json"));
                    }
                    expect_entry = true;
                    self.bump();
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::Colon => {
                    let message = format!("unexpected `{}` in json", self.describe(&token));
                    ElementError::note(&mut error, ElementError::new(message));
                    self.bump();
                }
                _ => {
                    if !expect_entry {
                        let message = format!(
                            "expected `,` or `}}` in json, found `{}`",
                            self.describe(&token)
                        );
                        ElementError::note(&mut error, ElementError::new(message));
                    }
                    let entry = self.parse_json_entry(&mut error);
                    entries.push(entry);
                    expect_entry = false;
                }
            }
        };

        self.depth -= 1;
        let mut element = self.element(Node::Json(entries), Span::new(start, end), line);
        element.error = error;
        element.into_arc()
    }

    fn parse_json_entry(&mut self, error: &mut Option<ElementError>) -> JsonEntry {
        let mut key = self.parse_element();
        if let Some(key_err) = key_error(&key) {
            ElementError::note(&mut Arc::make_mut(&mut key).error, key_err);
        }

        self.skip_trivia();
        if self.current_kind() != Some(&TokenKind::Colon) {
            let message = format!("expected `:` after key `{}` in json", key.text());
            ElementError::note(error, ElementError::new(message));
            return JsonEntry { key, value: None };
        }
        self.bump();

        self.skip_trivia();
        let value = match self.current_kind() {
            None | Some(TokenKind::Comma | TokenKind::RBrace) => {
                let message = format!("expected a value after `:` for key `{}`", key.text());
                ElementError::note(error, ElementError::new(message));
                None
            }
            Some(_) => Some(self.parse_element()),
        };
        JsonEntry { key, value }
    }

    /// `block { ... }`：花括号内的文本按子脚本重新切分命令
    pub(super) fn parse_block(&mut self) -> Arc<Element> {
        let (start, line) = match self.bump() {
            Some(keyword) => (keyword.span.start, keyword.line),
            None => (self.end, self.current_line()),
        };
        self.skip_blank();
        let Some(open) = self.bump() else {
            return self.missing_element("expected `{` after `block`".to_string());
        };

        let mut nesting = 0usize;
        let mut close = None;
        for (index, token) in self.tokens.iter().enumerate().skip(self.pos) {
            match token.kind {
                TokenKind::LBrace => nesting += 1,
                TokenKind::RBrace if nesting == 0 => {
                    close = Some(index);
                    break;
                }
                TokenKind::RBrace => nesting -= 1,
                _ => {}
            }
        }

        let inner_start = open.span.end;
        let (inner_end, end, error) = match close.and_then(|i| self.tokens.get(i)) {
            Some(token) => (token.span.start, token.span.end, None),
            None => (
                self.end,
                self.end,
                Some(ElementError::fatal("missing `}` to close block")),
            ),
        };

        let mut inner = self.sub_parser(inner_start, inner_end, open.line);
        let commands = inner.parse_commands();
        self.pos = close.map_or(self.tokens.len(), |i| i + 1);

        let node = Node::Block {
            commands,
            text: self.slice(Span::new(inner_start, inner_end)).to_string(),
        };
        let mut element = self.element(node, Span::new(start, end), line);
        element.error = error;
        element.into_arc()
    }
}
