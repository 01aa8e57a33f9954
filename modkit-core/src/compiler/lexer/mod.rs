//! 词法分析器
//!
//! 单遍扫描，按字符产出 [`Token`]。字符串字面量在这里完成转义处理。

pub mod token_kind;

pub use token_kind::TokenKind;

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

/// 源码位置（行列均从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coordinate {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 原文；字符串字面量为转义后的值
    pub text: String,
    pub coordinate: Coordinate,
}

/// 词法错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, at: Coordinate },

    #[error("unterminated string")]
    UnterminatedString { at: Coordinate },

    #[error("invalid escape sequence '\\{ch}'")]
    InvalidEscape { ch: char, at: Coordinate },

    #[error("invalid number literal '{text}'")]
    InvalidNumber { text: String, at: Coordinate },
}

impl LexError {
    pub fn coordinate(&self) -> Coordinate {
        match self {
            LexError::UnexpectedChar { at, .. }
            | LexError::UnterminatedString { at }
            | LexError::InvalidEscape { at, .. }
            | LexError::InvalidNumber { at, .. } => *at,
        }
    }
}

/// 词法分析器
pub struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// 扫描全部输入，末尾追加 Eof
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tracing::debug!(target: "modkit::lexer", count = tokens.len(), "tokenized");
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        let at = self.coordinate();
        let Some(ch) = self.advance() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                coordinate: at,
            });
        };

        let single = |kind: TokenKind| -> Result<Token, LexError> { Ok(token(kind, ch.to_string(), at)) };
        match ch {
            '(' => single(TokenKind::LeftParenthesis),
            ')' => single(TokenKind::RightParenthesis),
            '{' => single(TokenKind::LeftCurlyBrace),
            '}' => single(TokenKind::RightCurlyBrace),
            '[' => single(TokenKind::LeftSquareBracket),
            ']' => single(TokenKind::RightSquareBracket),
            ',' => single(TokenKind::Comma),
            ';' => single(TokenKind::Semicolon),
            ':' => single(TokenKind::Colon),
            '.' => single(TokenKind::Dot),
            '+' => single(TokenKind::Plus),
            '-' => single(TokenKind::Minus),
            '*' => single(TokenKind::Asterisk),
            '/' => single(TokenKind::Slash),
            '%' => single(TokenKind::Percent),
            '=' => Ok(self.either('=', TokenKind::DoubleEqual, TokenKind::Equal, at)),
            '>' => Ok(self.either('=', TokenKind::GreaterThanEqual, TokenKind::GreaterThan, at)),
            '<' => Ok(self.either('=', TokenKind::LessThanEqual, TokenKind::LessThan, at)),
            '!' => {
                if self.eat('=') {
                    Ok(token(TokenKind::ExclamationEqual, "!=".to_string(), at))
                } else {
                    Err(LexError::UnexpectedChar { ch, at })
                }
            }
            '"' | '\'' => self.string(ch, at),
            c if c.is_ascii_digit() => self.number(c, at),
            c if c.is_alphabetic() || c == '_' => Ok(self.identifier(c, at)),
            _ => Err(LexError::UnexpectedChar { ch, at }),
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_second() == Some('/') {
                while let Some(&(_, c)) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn string(&mut self, quote: char, at: Coordinate) -> Result<Token, LexError> {
        let mut value = String::new();
        loop {
            let escape_at = self.coordinate();
            match self.advance() {
                None | Some('\n') => return Err(LexError::UnterminatedString { at }),
                Some(c) if c == quote => break,
                Some('\\') => {
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some(other) => {
                            return Err(LexError::InvalidEscape {
                                ch: other,
                                at: escape_at,
                            })
                        }
                        None => return Err(LexError::UnterminatedString { at }),
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
        Ok(token(TokenKind::LiteralString, value, at))
    }

    fn number(&mut self, first: char, at: Coordinate) -> Result<Token, LexError> {
        let mut text = String::from(first);
        self.take_digits(&mut text);

        let mut kind = TokenKind::LiteralInteger;
        let fraction_follows = self
            .peek_second()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false);
        if self.peek() == Some('.') && fraction_follows {
            self.advance();
            text.push('.');
            self.take_digits(&mut text);
            kind = TokenKind::LiteralFloat;
        }

        let valid = match kind {
            TokenKind::LiteralInteger => text.parse::<i64>().is_ok(),
            _ => text.parse::<f64>().is_ok(),
        };
        if !valid || self.peek().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false) {
            while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
                text.push(c);
                self.advance();
            }
            return Err(LexError::InvalidNumber { text, at });
        }
        Ok(token(kind, text, at))
    }

    fn identifier(&mut self, first: char, at: Coordinate) -> Token {
        let mut text = String::from(first);
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            text.push(c);
            self.advance();
        }
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier);
        token(kind, text, at)
    }

    fn take_digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
            text.push(c);
            self.advance();
        }
    }

    fn either(&mut self, next: char, matched: TokenKind, single: TokenKind, at: Coordinate) -> Token {
        if self.eat(next) {
            token(matched, matched.describe().trim_matches('\'').to_string(), at)
        } else {
            token(single, single.describe().trim_matches('\'').to_string(), at)
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn coordinate(&self) -> Coordinate {
        Coordinate {
            line: self.line,
            column: self.column,
        }
    }
}

fn token(kind: TokenKind, text: String, coordinate: Coordinate) -> Token {
    Token {
        kind,
        text,
        coordinate,
    }
}
