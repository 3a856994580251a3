//! # 命令切分
//!
//! 每条命令占一行（参数内的括号可以跨行）：`name: argument`。

use std::sync::Arc;

use tracing::trace;

use super::ElementParser;
use crate::script::command::CommandNode;
use crate::script::element::{Element, ElementError};
use crate::script::token::{Span, Token, TokenKind};

impl ElementParser<'_> {
    /// 切分本范围内的全部命令
    ///
    /// 某条命令带有致命错误时，之后的文本不再解析。
    pub(crate) fn parse_commands(&mut self) -> Vec<CommandNode> {
        let mut commands = Vec::new();
        loop {
            self.skip_blank();
            let Some(head) = self.bump() else { break };
            let command = self.parse_command(head);
            let fatal = command.has_fatal();
            trace!(
                name = %command.name,
                line = command.line,
                fatal,
                "parsed command"
            );
            commands.push(command);
            if fatal {
                break;
            }
        }
        commands
    }

    fn parse_command(&mut self, head: Token) -> CommandNode {
        let line = head.line;
        if head.kind != TokenKind::Ident {
            let found = self.describe(&head);
            return self.broken_command(
                &head,
                found.clone(),
                format!("expected a command name, found `{found}`"),
            );
        }

        let name = self.slice(head.span).to_string();
        self.skip_comments();
        if self.current_kind() != Some(&TokenKind::Colon) {
            let message = format!("expected `:` after command name `{name}`");
            return self.broken_command(&head, name, message);
        }
        self.bump();

        if !self.catalog.contains(&name) {
            let message = format!("unknown command `{name}`");
            return self.broken_command(&head, name, message);
        }

        self.skip_comments();
        let argument = match self.current_kind() {
            None | Some(TokenKind::Newline) => None,
            Some(_) => Some(self.parse_element()),
        };

        self.skip_comments();
        let mut error = None;
        if let Some(token) = self.current().cloned()
            && token.kind != TokenKind::Newline
        {
            let message = format!("unexpected `{}` after command argument", self.describe(&token));
            error = Some(ElementError::new(message));
            self.skip_line();
        }

        let span = Span::new(head.span.start, self.last_end(head.span.end));
        let mut command = CommandNode::new(name, line, argument, span, self.slice(span));
        command.error = error;
        command
    }

    /// 命令头本身有误：吞掉整行并记录致命错误
    fn broken_command(&mut self, head: &Token, name: String, message: String) -> CommandNode {
        self.skip_line();
        let span = Span::new(head.span.start, self.last_end(head.span.end));
        let mut command = CommandNode::new(name, head.line, None, span, self.slice(span));
        command.error = Some(ElementError::fatal(message));
        command
    }

    /// 整段文本视为单个元素
    pub(super) fn parse_single(&mut self) -> Arc<Element> {
        self.depth += 1;
        self.skip_trivia();
        let element = if self.current().is_none() {
            self.missing_element("expected an element, found end of input".to_string())
        } else {
            self.parse_element()
        };

        self.skip_trivia();
        let trailing = self.current().cloned();
        self.depth -= 1;

        match trailing {
            Some(token) => {
                let message = format!("unexpected `{}` after element", self.describe(&token));
                Arc::unwrap_or_clone(element)
                    .with_error(ElementError::new(message))
                    .into_arc()
            }
            None => element,
        }
    }
}
