use std::fmt;

/// 词法单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // 关键字
    Var,
    If,
    Elif,
    Else,
    While,
    Break,
    Continue,
    Return,
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Import,
    Module,
    Fn,
    Unsafe,

    // 字面量
    LiteralInteger,
    LiteralFloat,
    LiteralString,

    // 标识符
    Identifier,

    // 双字符符号
    DoubleEqual,
    ExclamationEqual,
    GreaterThanEqual,
    LessThanEqual,

    // 单字符符号
    GreaterThan,
    LessThan,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Equal,
    Comma,
    Semicolon,
    Colon,
    Dot,
    LeftParenthesis,
    RightParenthesis,
    LeftCurlyBrace,
    RightCurlyBrace,
    LeftSquareBracket,
    RightSquareBracket,

    Eof,
}

impl TokenKind {
    /// 关键字查找
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "var" => TokenKind::Var,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "import" => TokenKind::Import,
            "module" => TokenKind::Module,
            "fn" => TokenKind::Fn,
            "unsafe" => TokenKind::Unsafe,
            _ => return None,
        };
        Some(kind)
    }

    /// 用于错误信息的名称
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Var => "'var'",
            TokenKind::If => "'if'",
            TokenKind::Elif => "'elif'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::Return => "'return'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Null => "'null'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Not => "'not'",
            TokenKind::Import => "'import'",
            TokenKind::Module => "'module'",
            TokenKind::Fn => "'fn'",
            TokenKind::Unsafe => "'unsafe'",
            TokenKind::LiteralInteger => "integer",
            TokenKind::LiteralFloat => "float",
            TokenKind::LiteralString => "string",
            TokenKind::Identifier => "identifier",
            TokenKind::DoubleEqual => "'=='",
            TokenKind::ExclamationEqual => "'!='",
            TokenKind::GreaterThanEqual => "'>='",
            TokenKind::LessThanEqual => "'<='",
            TokenKind::GreaterThan => "'>'",
            TokenKind::LessThan => "'<'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Asterisk => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Equal => "'='",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
            TokenKind::Dot => "'.'",
            TokenKind::LeftParenthesis => "'('",
            TokenKind::RightParenthesis => "')'",
            TokenKind::LeftCurlyBrace => "'{'",
            TokenKind::RightCurlyBrace => "'}'",
            TokenKind::LeftSquareBracket => "'['",
            TokenKind::RightSquareBracket => "']'",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
