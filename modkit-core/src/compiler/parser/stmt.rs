use super::expr::Expr;
use crate::compiler::lexer::Coordinate;

/// 语句节点
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub coordinate: Coordinate,
}

impl Stmt {
    pub fn new(kind: StmtKind, coordinate: Coordinate) -> Self {
        Stmt { kind, coordinate }
    }

    /// 执行后控制流不会落到下一条语句
    pub fn diverges(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Var {
        name: String,
        initializer: Option<Expr>,
    },
    Assign {
        name: String,
        value: Expr,
    },
    /// `name[index] = value`
    IndexAssign {
        name: String,
        index: Expr,
        value: Expr,
    },
    Block(Vec<Stmt>),
    /// if / elif 分支按顺序排列
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Unsafe(Vec<Stmt>),
}

/// `import name;`
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub name: String,
    pub coordinate: Coordinate,
}

/// `fn name(params) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub coordinate: Coordinate,
}

/// `module name { fn ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDecl {
    pub name: String,
    pub functions: Vec<FunctionDecl>,
    pub coordinate: Coordinate,
}

/// 整个源文件
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub imports: Vec<Import>,
    pub modules: Vec<ModuleDecl>,
    /// 顶层语句，编译为脚本入口
    pub statements: Vec<Stmt>,
}
