use crate::compiler::lexer::{Coordinate, LexError};
use thiserror::Error;

/// 语法错误，包含位置信息
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {coordinate}")]
pub struct ParserError {
    pub kind: ParserErrorKind,
    pub coordinate: Coordinate,
}

/// 语法错误类型
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParserErrorKind {
    #[error("{0}")]
    Lex(LexError),

    #[error("expected {expected}, found {found}")]
    UnexpectedToken { found: String, expected: String },

    #[error("expected expression, found {found}")]
    ExpectedExpression { found: String },

    #[error("invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("unsafe blocks are not allowed")]
    UnsafeNotAllowed,

    #[error("'{0}' is only allowed at the top level")]
    TopLevelOnly(&'static str),

    #[error("too many {what} (limit {limit})")]
    TooMany { what: &'static str, limit: usize },

    #[error("nesting too deep (limit {0})")]
    NestingTooDeep(usize),
}

impl ParserError {
    pub fn at(kind: ParserErrorKind, coordinate: Coordinate) -> Self {
        ParserError { kind, coordinate }
    }

    pub fn line(&self) -> usize {
        self.coordinate.line
    }

    pub fn column(&self) -> usize {
        self.coordinate.column
    }
}

impl From<LexError> for ParserError {
    fn from(err: LexError) -> Self {
        let coordinate = err.coordinate();
        ParserError {
            kind: ParserErrorKind::Lex(err),
            coordinate,
        }
    }
}

pub type ParseResult<T> = Result<T, ParserError>;
