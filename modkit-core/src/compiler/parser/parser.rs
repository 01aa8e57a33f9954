//! Pratt 语法分析器

use super::error::{ParseResult, ParserError, ParserErrorKind};
use super::expr::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
use super::stmt::{FunctionDecl, Import, ModuleDecl, Program, Stmt, StmtKind};
use crate::compiler::lexer::{Lexer, Token, TokenKind};

/// 函数参数与调用实参上限（Call 指令操作数为 u8）
pub const MAX_ARGUMENTS: usize = u8::MAX as usize;
/// 嵌套深度上限
pub const MAX_NESTING: usize = 64;

/// 运算符优先级（从低到高）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
}

impl Precedence {
    fn of(kind: TokenKind) -> Precedence {
        match kind {
            TokenKind::Or => Precedence::Or,
            TokenKind::And => Precedence::And,
            TokenKind::DoubleEqual | TokenKind::ExclamationEqual => Precedence::Equality,
            TokenKind::GreaterThan
            | TokenKind::GreaterThanEqual
            | TokenKind::LessThan
            | TokenKind::LessThanEqual => Precedence::Comparison,
            TokenKind::Plus | TokenKind::Minus => Precedence::Term,
            TokenKind::Asterisk | TokenKind::Slash | TokenKind::Percent => Precedence::Factor,
            TokenKind::LeftParenthesis | TokenKind::Dot | TokenKind::LeftSquareBracket => {
                Precedence::Call
            }
            _ => Precedence::None,
        }
    }

    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary | Precedence::Call => Precedence::Call,
        }
    }
}

/// 语法分析器
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    allow_unsafe: bool,
    depth: usize,
}

impl Parser {
    /// 从词法单元创建；末尾没有 Eof 时自动补上
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let coordinate = tokens.last().map(|t| t.coordinate).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                coordinate,
            });
        }
        Parser {
            tokens,
            current: 0,
            allow_unsafe: false,
            depth: 0,
        }
    }

    /// 词法分析 + 创建分析器
    pub fn from_source(source: &str) -> ParseResult<Self> {
        Ok(Self::new(Lexer::new(source).tokenize()?))
    }

    /// 是否接受 `unsafe { }` 块（默认拒绝）
    ///
    /// 这是语法层的第二道拦截；上层的子串安全闸门始终拒绝 `unsafe`。
    pub fn allow_unsafe(mut self, allow: bool) -> Self {
        self.allow_unsafe = allow;
        self
    }

    /// 解析整个程序
    pub fn parse(&mut self) -> ParseResult<Program> {
        let mut program = Program::default();
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Import => program.imports.push(self.parse_import()?),
                TokenKind::Module => program.modules.push(self.parse_module()?),
                _ => program.statements.push(self.parse_statement()?),
            }
        }
        tracing::debug!(
            target: "modkit::parser",
            imports = program.imports.len(),
            modules = program.modules.len(),
            statements = program.statements.len(),
            "parsed program"
        );
        Ok(program)
    }

    /// 只解析单个表达式（后面必须是输入结束）
    pub fn parse_single_expression(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_expression()?;
        self.expect(TokenKind::Eof)?;
        Ok(expr)
    }

    // ===== 顶层 =====

    fn parse_import(&mut self) -> ParseResult<Import> {
        let coordinate = self.advance().coordinate;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Import { name, coordinate })
    }

    fn parse_module(&mut self) -> ParseResult<ModuleDecl> {
        let coordinate = self.advance().coordinate;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LeftCurlyBrace)?;

        let mut functions = Vec::new();
        while !self.check(TokenKind::RightCurlyBrace) && !self.is_at_end() {
            functions.push(self.parse_function()?);
        }
        self.expect(TokenKind::RightCurlyBrace)?;
        Ok(ModuleDecl {
            name,
            functions,
            coordinate,
        })
    }

    fn parse_function(&mut self) -> ParseResult<FunctionDecl> {
        let coordinate = self.expect(TokenKind::Fn)?.coordinate;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LeftParenthesis)?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParenthesis) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    return Err(self.error_here(ParserErrorKind::TooMany {
                        what: "parameters",
                        limit: MAX_ARGUMENTS,
                    }));
                }
                params.push(self.expect_identifier()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParenthesis)?;
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            params,
            body,
            coordinate,
        })
    }

    // ===== 语句 =====

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let coordinate = self.peek().coordinate;
        let kind = match self.peek().kind {
            TokenKind::Var => self.parse_var()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::While => {
                self.advance();
                let condition = self.parse_expression()?;
                let body = self.parse_block()?;
                StmtKind::While { condition, body }
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Continue
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Return(value)
            }
            TokenKind::LeftCurlyBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Unsafe => {
                if !self.allow_unsafe {
                    return Err(self.error_here(ParserErrorKind::UnsafeNotAllowed));
                }
                self.advance();
                StmtKind::Unsafe(self.parse_block()?)
            }
            TokenKind::Import => return Err(self.error_here(ParserErrorKind::TopLevelOnly("import"))),
            TokenKind::Module => return Err(self.error_here(ParserErrorKind::TopLevelOnly("module"))),
            TokenKind::Fn => return Err(self.error_here(ParserErrorKind::TopLevelOnly("fn"))),
            _ => self.parse_expression_statement()?,
        };
        Ok(Stmt::new(kind, coordinate))
    }

    fn parse_var(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let name = self.expect_identifier()?;
        let initializer = if self.eat(TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(StmtKind::Var { name, initializer })
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let mut branches = Vec::new();
        let condition = self.parse_expression()?;
        branches.push((condition, self.parse_block()?));

        while self.eat(TokenKind::Elif) {
            let condition = self.parse_expression()?;
            branches.push((condition, self.parse_block()?));
        }
        let else_branch = if self.eat(TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(StmtKind::If {
            branches,
            else_branch,
        })
    }

    fn parse_expression_statement(&mut self) -> ParseResult<StmtKind> {
        let expr = self.parse_expression()?;
        if self.check(TokenKind::Equal) {
            let equal = self.advance().coordinate;
            let value = self.parse_expression()?;
            self.expect(TokenKind::Semicolon)?;
            return match expr.kind {
                ExprKind::VarRef(name) => Ok(StmtKind::Assign { name, value }),
                ExprKind::IndexAccess { object, index } => match object.kind {
                    ExprKind::VarRef(name) => Ok(StmtKind::IndexAssign {
                        name,
                        index: *index,
                        value,
                    }),
                    _ => Err(ParserError::at(ParserErrorKind::InvalidAssignmentTarget, equal)),
                },
                _ => Err(ParserError::at(ParserErrorKind::InvalidAssignmentTarget, equal)),
            };
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(StmtKind::Expr(expr))
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(TokenKind::LeftCurlyBrace)?;
        self.enter()?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightCurlyBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        self.depth -= 1;
        self.expect(TokenKind::RightCurlyBrace)?;
        Ok(statements)
    }

    // ===== 表达式 =====

    /// 解析表达式
    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_precedence(Precedence::Or)
    }

    /// 中缀循环每轮都让左侧树加深一层，同样计入嵌套深度
    fn parse_precedence(&mut self, min: Precedence) -> ParseResult<Expr> {
        self.enter()?;
        let mut left = self.parse_prefix()?;
        let mut chained = 0;
        loop {
            let precedence = Precedence::of(self.peek().kind);
            if precedence == Precedence::None || precedence < min {
                break;
            }
            self.enter()?;
            chained += 1;
            left = self.parse_infix(left, precedence)?;
        }
        self.depth -= 1 + chained;
        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let token = self.advance().clone();
        let at = token.coordinate;
        let kind = match token.kind {
            TokenKind::LiteralInteger => {
                // 词法阶段已校验范围
                ExprKind::LiteralInt(token.text.parse().unwrap_or_default())
            }
            TokenKind::LiteralFloat => ExprKind::LiteralFloat(token.text.parse().unwrap_or_default()),
            TokenKind::LiteralString => ExprKind::LiteralString(token.text),
            TokenKind::True => ExprKind::LiteralTrue,
            TokenKind::False => ExprKind::LiteralFalse,
            TokenKind::Null => ExprKind::LiteralNull,
            TokenKind::Identifier => ExprKind::VarRef(token.text),
            TokenKind::LeftParenthesis => {
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParenthesis)?;
                ExprKind::Grouping(Box::new(inner))
            }
            TokenKind::LeftSquareBracket => {
                let elements = self.parse_list(TokenKind::RightSquareBracket, "list elements", u16::MAX as usize)?;
                ExprKind::LiteralList(elements)
            }
            TokenKind::Minus => ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(self.parse_precedence(Precedence::Unary)?),
            },
            TokenKind::Not => ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(self.parse_precedence(Precedence::Unary)?),
            },
            _ => {
                return Err(ParserError::at(
                    ParserErrorKind::ExpectedExpression {
                        found: describe(&token),
                    },
                    at,
                ))
            }
        };
        Ok(Expr::new(kind, at))
    }

    fn parse_infix(&mut self, left: Expr, precedence: Precedence) -> ParseResult<Expr> {
        let token = self.advance().clone();
        let at = token.coordinate;
        let left = Box::new(left);

        let kind = match token.kind {
            TokenKind::And | TokenKind::Or => {
                let op = if token.kind == TokenKind::And {
                    LogicalOp::And
                } else {
                    LogicalOp::Or
                };
                let right = Box::new(self.parse_precedence(precedence.next())?);
                ExprKind::Logical { left, op, right }
            }
            TokenKind::LeftParenthesis => {
                let arguments = self.parse_list(TokenKind::RightParenthesis, "arguments", MAX_ARGUMENTS)?;
                ExprKind::FunctionCall {
                    callee: left,
                    arguments,
                }
            }
            TokenKind::Dot => {
                let member = self.expect_identifier()?;
                ExprKind::MemberAccess {
                    object: left,
                    member,
                }
            }
            TokenKind::LeftSquareBracket => {
                let index = Box::new(self.parse_expression()?);
                self.expect(TokenKind::RightSquareBracket)?;
                ExprKind::IndexAccess { object: left, index }
            }
            other => {
                let op = binary_op(other).ok_or_else(|| {
                    ParserError::at(
                        ParserErrorKind::ExpectedExpression {
                            found: describe(&token),
                        },
                        at,
                    )
                })?;
                let right = Box::new(self.parse_precedence(precedence.next())?);
                ExprKind::Binary { left, op, right }
            }
        };
        Ok(Expr::new(kind, at))
    }

    /// 逗号分隔的表达式列表，起始括号已消费
    fn parse_list(&mut self, close: TokenKind, what: &'static str, limit: usize) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        if !self.check(close) {
            loop {
                if items.len() >= limit {
                    return Err(self.error_here(ParserErrorKind::TooMany { what, limit }));
                }
                items.push(self.parse_expression()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    // ===== 工具 =====

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_here(ParserErrorKind::NestingTooDeep(MAX_NESTING)));
        }
        Ok(())
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &Token {
        let index = self.current.min(self.tokens.len() - 1);
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[index]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<&Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        Err(self.error_here(ParserErrorKind::UnexpectedToken {
            found: describe(self.peek()),
            expected: kind.describe().to_string(),
        }))
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        Ok(self.expect(TokenKind::Identifier)?.text.clone())
    }

    fn error_here(&self, kind: ParserErrorKind) -> ParserError {
        ParserError::at(kind, self.peek().coordinate)
    }
}

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Asterisk => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::DoubleEqual => BinaryOp::Equal,
        TokenKind::ExclamationEqual => BinaryOp::NotEqual,
        TokenKind::GreaterThan => BinaryOp::Greater,
        TokenKind::GreaterThanEqual => BinaryOp::GreaterEqual,
        TokenKind::LessThan => BinaryOp::Less,
        TokenKind::LessThanEqual => BinaryOp::LessEqual,
        _ => return None,
    })
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Identifier => format!("identifier '{}'", token.text),
        TokenKind::LiteralInteger | TokenKind::LiteralFloat => format!("number {}", token.text),
        TokenKind::LiteralString => "string literal".to_string(),
        other => other.describe().to_string(),
    }
}

/// 便捷函数：词法 + 语法分析
pub fn parse_source(source: &str, allow_unsafe: bool) -> ParseResult<Program> {
    Parser::from_source(source)?.allow_unsafe(allow_unsafe).parse()
}
