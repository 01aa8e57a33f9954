pub mod error;
pub mod expr;
pub mod parser;
pub mod stmt;

pub use error::{ParseResult, ParserError, ParserErrorKind};
pub use expr::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
pub use parser::{parse_source, Parser, MAX_ARGUMENTS, MAX_NESTING};
pub use stmt::{FunctionDecl, Import, ModuleDecl, Program, Stmt, StmtKind};
