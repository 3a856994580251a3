//! # Token 模块
//!
//! 词法分析：把原始字符分类为字面量起始、结构标点、运算符与注释。
//!
//! ## 设计说明
//!
//! - 词法分析从不失败：无法识别的字符产生 `Unknown` token，由解析器决定如何报告
//! - 每个 token 记录源码中的字节区间（绝对偏移）与行号（从 1 开始）
//! - 字符串内的 `//` 不是注释

use std::fmt;

use thiserror::Error;

/// 源码区间（字节偏移，左闭右开）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 合并两个区间，得到覆盖两者的最小区间
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    /// 下游目标语言中的优先级（数值越大绑定越紧）
    ///
    /// 本语言自身严格从左到右折叠，重建文本时依据此值补括号。
    pub fn precedence(self) -> u8 {
        match self {
            Self::Mul | Self::Div => 5,
            Self::Add | Self::Sub => 4,
            Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 3,
            Self::Eq | Self::NotEq => 2,
            Self::And => 1,
            Self::Or => 0,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 词法错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// 字符串没有闭合引号
    #[error("unclosed string: missing `{quote}`")]
    UnterminatedString { quote: char },

    /// 数字中出现第二个 `.`
    #[error("unexpected `.` in number: a number can only contain one `.`")]
    ExtraDot,
}

impl LexError {
    /// 是否致命（之后的 token 位置不可信）
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnterminatedString { .. })
    }
}

/// token 类型
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// 字符串字面量，`value` 为去掉转义后的内容
    Str { value: String, quote: char },
    /// 数字字面量（不含符号）
    Number { float: bool },
    /// 标识符
    Ident,
    /// `true` / `false`
    Bool(bool),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Pipe,
    Operator(Operator),
    Newline,
    /// `//` 行注释
    Comment,
    /// 无法识别的字符
    Unknown(char),
}

impl TokenKind {
    /// 是否为关闭分隔符
    pub fn is_closer(&self) -> bool {
        matches!(self, Self::RParen | Self::RBracket | Self::RBrace)
    }
}

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub line: usize,
    pub error: Option<LexError>,
}

impl Token {
    fn new(kind: TokenKind, span: Span, line: usize) -> Self {
        Self {
            kind,
            span,
            line,
            error: None,
        }
    }
}

/// 对整段文本做词法分析
pub fn tokenize(src: &str) -> Vec<Token> {
    tokenize_range(src, 0, src.len(), 1)
}

/// 对 `src[start..end]` 做词法分析
///
/// 返回的区间是 `src` 中的绝对偏移；`line` 为 `start` 所在行号。
/// 块（block）的子脚本借此复用外层源码的位置信息。
pub fn tokenize_range(src: &str, start: usize, end: usize, line: usize) -> Vec<Token> {
    let mut lexer = Lexer {
        src,
        pos: start,
        end: end.min(src.len()),
        line,
        tokens: Vec::new(),
    };
    lexer.run();
    lexer.tokens
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    end: usize,
    line: usize,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..self.end].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, start: usize, line: usize) {
        self.tokens
            .push(Token::new(kind, Span::new(start, self.pos), line));
    }

    fn run(&mut self) {
        while let Some(c) = self.peek() {
            let start = self.pos;
            let line = self.line;

            match c {
                '\n' => {
                    self.bump();
                    self.push(TokenKind::Newline, start, line);
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    self.push(TokenKind::Comment, start, line);
                }
                '"' | '\'' => self.lex_string(c),
                '0'..='9' => self.lex_number(),
                c if c.is_alphabetic() || c == '_' => self.lex_ident(),
                '|' => {
                    self.bump();
                    if self.peek() == Some('|') && !self.inside_variable() {
                        self.bump();
                        self.push(TokenKind::Operator(Operator::Or), start, line);
                    } else {
                        self.push(TokenKind::Pipe, start, line);
                    }
                }
                _ => self.lex_punct(c),
            }
        }
    }

    /// 前两个 token 为 `|` 与标识符时，下一个 `|` 是变量的闭合符
    fn inside_variable(&self) -> bool {
        let n = self.tokens.len();
        n >= 2
            && self.tokens[n - 1].kind == TokenKind::Ident
            && self.tokens[n - 2].kind == TokenKind::Pipe
    }

    fn lex_punct(&mut self, c: char) {
        let start = self.pos;
        let line = self.line;
        self.bump();

        let single = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            '+' => Some(TokenKind::Operator(Operator::Add)),
            '-' => Some(TokenKind::Operator(Operator::Sub)),
            '*' => Some(TokenKind::Operator(Operator::Mul)),
            '/' => Some(TokenKind::Operator(Operator::Div)),
            _ => None,
        };
        if let Some(kind) = single {
            self.push(kind, start, line);
            return;
        }

        let next = self.peek();
        let kind = match (c, next) {
            ('=', Some('=')) => Some(Operator::Eq),
            ('!', Some('=')) => Some(Operator::NotEq),
            ('<', Some('=')) => Some(Operator::LtEq),
            ('>', Some('=')) => Some(Operator::GtEq),
            ('&', Some('&')) => Some(Operator::And),
            _ => None,
        };
        let kind = match kind {
            Some(op) => {
                self.bump();
                TokenKind::Operator(op)
            }
            None => match c {
                '<' => TokenKind::Operator(Operator::Lt),
                '>' => TokenKind::Operator(Operator::Gt),
                other => TokenKind::Unknown(other),
            },
        };
        self.push(kind, start, line);
    }

    fn lex_string(&mut self, quote: char) {
        let start = self.pos;
        let line = self.line;
        self.bump();

        let mut value = String::new();
        let mut closed = false;
        while let Some(c) = self.bump() {
            if c == quote {
                closed = true;
                break;
            }
            if c == '\\' {
                match self.peek() {
                    Some(next) if next == quote || next == '\\' => {
                        self.bump();
                        value.push(next);
                    }
                    Some(next @ ('n' | 't' | 'r')) => {
                        self.bump();
                        value.push(match next {
                            'n' => '\n',
                            't' => '\t',
                            _ => '\r',
                        });
                    }
                    Some('u') => match self.unicode_escape() {
                        Some(decoded) => value.push(decoded),
                        None => value.push(c),
                    },
                    _ => value.push(c),
                }
                continue;
            }
            value.push(c);
        }

        self.push(TokenKind::Str { value, quote }, start, line);
        if !closed && let Some(token) = self.tokens.last_mut() {
            token.error = Some(LexError::UnterminatedString { quote });
        }
    }

    /// `\uXXXX`：成功时消费 `u` 与四位十六进制数字
    fn unicode_escape(&mut self) -> Option<char> {
        let hex = (1..=4)
            .map(|i| self.peek_at(i))
            .collect::<Option<String>>()?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let decoded = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)?;
        for _ in 0..5 {
            self.bump();
        }
        Some(decoded)
    }

    fn lex_number(&mut self) {
        let start = self.pos;
        let line = self.line;
        let mut dots = 0;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' => dots += 1,
                _ => break,
            }
            self.bump();
        }

        self.push(TokenKind::Number { float: dots > 0 }, start, line);
        if dots > 1 && let Some(token) = self.tokens.last_mut() {
            token.error = Some(LexError::ExtraDot);
        }
    }

    fn lex_ident(&mut self) {
        let start = self.pos;
        let line = self.line;
        while let Some(c) = self.peek() {
            let continues = c.is_alphanumeric()
                || c == '_'
                || (c == '-' && self.peek_at(1).is_some_and(char::is_alphabetic));
            if !continues {
                break;
            }
            self.bump();
        }

        let kind = match &self.src[start..self.pos] {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => TokenKind::Ident,
        };
        self.push(kind, start, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_punctuation_and_operators() {
        assert_eq!(
            kinds("( ) [ ] { } , :"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Comma,
                TokenKind::Colon,
            ]
        );

        let ops: Vec<_> = kinds("+ - * / == != < <= > >= && ||")
            .into_iter()
            .map(|k| match k {
                TokenKind::Operator(op) => op.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            ops,
            vec!["+", "-", "*", "/", "==", "!=", "<", "<=", ">", ">=", "&&", "||"]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#""a\"b" 'c\'d' "e\\""#);
        assert_eq!(
            tokens[0].kind,
            TokenKind::Str {
                value: "a\"b".to_string(),
                quote: '"'
            }
        );
        assert_eq!(
            tokens[1].kind,
            TokenKind::Str {
                value: "c'd".to_string(),
                quote: '\''
            }
        );
        assert_eq!(
            tokens[2].kind,
            TokenKind::Str {
                value: "e\\".to_string(),
                quote: '"'
            }
        );
        assert!(tokens.iter().all(|t| t.error.is_none()));
    }

    #[test]
    fn test_control_escapes_are_decoded() {
        let tokens = tokenize(r#""a\nb\tc\u0001" "\d" "\u00zz""#);
        assert_eq!(
            tokens[0].kind,
            TokenKind::Str {
                value: "a\nb\tc\u{1}".to_string(),
                quote: '"'
            }
        );
        // 未知转义保留反斜杠
        assert!(matches!(&tokens[1].kind, TokenKind::Str { value, .. } if value == "\\d"));
        assert!(matches!(&tokens[2].kind, TokenKind::Str { value, .. } if value == "\\u00zz"));
        assert_eq!(tokens[0].line, tokens[2].line);
    }

    #[test]
    fn test_unterminated_string_is_fatal() {
        let tokens = tokenize(r#""abc"#);
        assert_eq!(tokens.len(), 1);
        let err = tokens[0].error.as_ref().unwrap();
        assert!(err.is_fatal());
        assert_eq!(tokens[0].span, Span::new(0, 4));
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("12 3.5 1.2.3");
        assert_eq!(tokens[0].kind, TokenKind::Number { float: false });
        assert_eq!(tokens[1].kind, TokenKind::Number { float: true });
        assert_eq!(tokens[2].error, Some(LexError::ExtraDot));
        assert!(!LexError::ExtraDot.is_fatal());
    }

    #[test]
    fn test_identifiers_and_booleans() {
        assert_eq!(
            kinds("go-to true false x-1"),
            vec![
                TokenKind::Ident,
                TokenKind::Bool(true),
                TokenKind::Bool(false),
                TokenKind::Ident,
                TokenKind::Operator(Operator::Sub),
                TokenKind::Number { float: false },
            ]
        );
    }

    #[test]
    fn test_comments_not_honored_inside_strings() {
        let tokens = tokenize("\"http://a\" // tail\nx");
        assert!(matches!(&tokens[0].kind, TokenKind::Str { value, .. } if value == "http://a"));
        assert_eq!(tokens[1].kind, TokenKind::Comment);
        assert_eq!(tokens[2].kind, TokenKind::Newline);
        assert_eq!(tokens[3].kind, TokenKind::Ident);
        assert_eq!(tokens[3].line, 2);
    }

    #[test]
    fn test_variable_pipes_versus_or() {
        assert_eq!(
            kinds("|a| || |b|"),
            vec![
                TokenKind::Pipe,
                TokenKind::Ident,
                TokenKind::Pipe,
                TokenKind::Operator(Operator::Or),
                TokenKind::Pipe,
                TokenKind::Ident,
                TokenKind::Pipe,
            ]
        );
        // 紧贴的闭合符不会被当作 `||`
        assert_eq!(
            kinds("|a||"),
            vec![
                TokenKind::Pipe,
                TokenKind::Ident,
                TokenKind::Pipe,
                TokenKind::Pipe
            ]
        );
    }

    #[test]
    fn test_unknown_characters() {
        assert_eq!(
            kinds("@ = !"),
            vec![
                TokenKind::Unknown('@'),
                TokenKind::Unknown('='),
                TokenKind::Unknown('!')
            ]
        );
    }

    #[test]
    fn test_range_keeps_absolute_offsets() {
        let src = "a: block {\n  reload:\n}";
        let open = src.find('{').unwrap() + 1;
        let close = src.rfind('}').unwrap();
        let tokens = tokenize_range(src, open, close, 1);
        let ident = tokens.iter().find(|t| t.kind == TokenKind::Ident).unwrap();
        assert_eq!(&src[ident.span.start..ident.span.end], "reload");
        assert_eq!(ident.line, 2);
    }
}
