//! # 游标辅助函数

use std::sync::Arc;

use super::{ElementParser, MAX_NESTING};
use crate::script::element::{Element, ElementError, Node};
use crate::script::token::{Span, Token, TokenKind};

impl<'a> ElementParser<'a> {
    /// 当前 token（不跳过任何内容）
    pub(super) fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(super) fn current_kind(&self) -> Option<&TokenKind> {
        self.current().map(|t| &t.kind)
    }

    pub(super) fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// 跳过注释；括号内还跳过换行
    pub(super) fn skip_trivia(&mut self) {
        while let Some(kind) = self.current_kind() {
            match kind {
                TokenKind::Comment => self.pos += 1,
                TokenKind::Newline if self.depth > 0 => self.pos += 1,
                _ => break,
            }
        }
    }

    /// 跳过注释与换行
    pub(super) fn skip_blank(&mut self) {
        while matches!(
            self.current_kind(),
            Some(TokenKind::Comment | TokenKind::Newline)
        ) {
            self.pos += 1;
        }
    }

    /// 只跳过注释
    pub(super) fn skip_comments(&mut self) {
        while matches!(self.current_kind(), Some(TokenKind::Comment)) {
            self.pos += 1;
        }
    }

    /// 跳到行尾（不消费换行）
    pub(super) fn skip_line(&mut self) {
        while let Some(kind) = self.current_kind() {
            if *kind == TokenKind::Newline {
                break;
            }
            self.pos += 1;
        }
    }

    pub(super) fn slice(&self, span: Span) -> &'a str {
        let src: &'a str = self.src;
        &src[span.start..span.end]
    }

    /// 上一个被消费的有效 token（跳过注释与换行）的结束位置
    pub(super) fn last_end(&self, fallback: usize) -> usize {
        self.tokens[..self.pos]
            .iter()
            .rev()
            .find(|t| !matches!(t.kind, TokenKind::Comment | TokenKind::Newline))
            .map_or(fallback, |t| t.span.end)
    }

    /// 当前所在行（到达末尾时取最后一个 token 的行）
    pub(super) fn current_line(&self) -> usize {
        self.current()
            .or_else(|| self.tokens.last())
            .map_or(self.first_line, |t| t.line)
    }

    /// token 的描述文本，用于诊断
    pub(super) fn describe(&self, token: &Token) -> String {
        match token.kind {
            TokenKind::Newline => "newline".to_string(),
            _ => self.slice(token.span).to_string(),
        }
    }

    pub(super) fn element(&self, node: Node, span: Span, line: usize) -> Element {
        Element::new(node, span, line, Arc::clone(&self.origin))
    }

    /// 进入一层容器；超过 [`MAX_NESTING`] 时整体跳过该容器
    pub(super) fn nested(&mut self, parse: fn(&mut Self) -> Arc<Element>) -> Arc<Element> {
        if self.nesting >= MAX_NESTING {
            return self.too_deep();
        }
        self.nesting += 1;
        let element = parse(self);
        self.nesting -= 1;
        element
    }

    /// 消费当前容器连同其中全部配对的括号，返回致命的占位节点
    fn too_deep(&mut self) -> Arc<Element> {
        let start = self.current().map_or(self.end, |t| t.span.start);
        let line = self.current_line();
        let mut open = 0usize;
        let mut entered = false;
        while let Some(token) = self.bump() {
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                    open += 1;
                    entered = true;
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    open = open.saturating_sub(1);
                }
                _ => {}
            }
            if entered && open == 0 {
                break;
            }
        }
        let end = self.last_end(start);
        let message = format!("nesting too deep: more than {MAX_NESTING} levels");
        self.element(Node::Unknown, Span::new(start, end), line)
            .with_error(ElementError::fatal(message))
            .into_arc()
    }

    /// 本该出现元素的位置没有元素：返回占位节点，不消费 token
    pub(super) fn missing_element(&self, message: String) -> Arc<Element> {
        let at = self.current().map_or(self.end, |t| t.span.start);
        self.element(Node::Unknown, Span::new(at, at), self.current_line())
            .with_error(ElementError::new(message))
            .into_arc()
    }

    /// 当前 token 能否开始一个操作数
    pub(super) fn starts_operand(&self) -> bool {
        matches!(
            self.current_kind(),
            Some(
                TokenKind::Str { .. }
                    | TokenKind::Number { .. }
                    | TokenKind::Bool(_)
                    | TokenKind::Ident
                    | TokenKind::Pipe
                    | TokenKind::LParen
                    | TokenKind::LBracket
                    | TokenKind::LBrace
                    | TokenKind::Unknown(_)
            )
        )
    }
}
