//! 编译/执行链路中统一的成功或失败类型

use crate::diagnostic::{Diagnostic, DiagnosticCategory};
use crate::security::SecurityViolation;

/// 失败原因
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// 输入为空
    Input(String),
    Security(SecurityViolation),
    /// 语法或编译错误（附带已产生的警告）
    Compile {
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
    },
    /// 执行失败（运行时错误、执行限制、原生函数 panic）
    Execution(String),
    /// 流程内部失败（捕获到的 panic 等）
    Internal(String),
}

impl FailureReason {
    /// 人类可读的错误消息
    pub fn messages(&self) -> Vec<String> {
        match self {
            FailureReason::Compile { errors, .. } => errors.iter().map(ToString::to_string).collect(),
            FailureReason::Input(message)
            | FailureReason::Execution(message)
            | FailureReason::Internal(message) => vec![message.clone()],
            FailureReason::Security(violation) => vec![violation.to_string()],
        }
    }

    /// 转换为错误诊断 + 警告诊断
    pub fn into_diagnostics(self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        match self {
            FailureReason::Compile { errors, warnings } => (errors, warnings),
            FailureReason::Input(message) => {
                (vec![Diagnostic::error(DiagnosticCategory::Input, message)], Vec::new())
            }
            FailureReason::Security(violation) => (
                vec![Diagnostic::error(DiagnosticCategory::Security, violation.to_string())],
                Vec::new(),
            ),
            FailureReason::Execution(message) | FailureReason::Internal(message) => (
                vec![Diagnostic::error(DiagnosticCategory::Internal, message)],
                Vec::new(),
            ),
        }
    }
}

/// 成功值或失败原因
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(FailureReason),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(reason) => Outcome::Failure(reason),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Outcome::Success(value) => f(value),
            Outcome::Failure(reason) => Outcome::Failure(reason),
        }
    }

    pub fn into_result(self) -> Result<T, FailureReason> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(reason) => Err(reason),
        }
    }
}

impl<T> From<Result<T, FailureReason>> for Outcome<T> {
    fn from(result: Result<T, FailureReason>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(reason) => Outcome::Failure(reason),
        }
    }
}
