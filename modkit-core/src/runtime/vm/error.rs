//! 运行时错误

use thiserror::Error;

/// 运行时错误：错误种类 + 出错位置
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    /// 出错指令所在行（0 表示未知）
    pub line: usize,
    /// 出错时正在执行的函数
    pub function: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind) -> Self {
        RuntimeError {
            kind,
            line: 0,
            function: String::new(),
        }
    }

    /// 是否由执行限制触发
    pub fn is_limit(&self) -> bool {
        matches!(
            self.kind,
            RuntimeErrorKind::StackOverflow
                | RuntimeErrorKind::CallDepthExceeded(_)
                | RuntimeErrorKind::InstructionLimit(_)
                | RuntimeErrorKind::Timeout(_)
                | RuntimeErrorKind::Interrupted
                | RuntimeErrorKind::ValueTooLarge(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeErrorKind {
    #[error("type error: {0}")]
    TypeError(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{0}'")]
    Overflow(&'static str),

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("'{owner}' has no member '{member}'")]
    UndefinedMember { owner: String, member: String },

    #[error("'{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("value of type {0} is not callable")]
    NotCallable(&'static str),

    #[error("stack overflow")]
    StackOverflow,

    #[error("maximum call depth {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("instruction limit of {0} exceeded")]
    InstructionLimit(u64),

    #[error("execution timed out after {0} ms")]
    Timeout(u64),

    #[error("execution interrupted")]
    Interrupted,

    #[error("value exceeds the size limit of {0}")]
    ValueTooLarge(usize),

    #[error("{name}: {message}")]
    Native { name: String, message: String },

    #[error("native function '{0}' panicked")]
    NativePanic(String),

    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),
}

impl From<RuntimeErrorKind> for RuntimeError {
    fn from(kind: RuntimeErrorKind) -> Self {
        RuntimeError::new(kind)
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
