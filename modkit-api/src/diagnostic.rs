//! 编译诊断

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// 诊断来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    /// 空输入等
    Input,
    /// 安全闸门拒绝
    Security,
    /// 词法或语法错误
    Syntax,
    /// 名称解析等编译错误与警告
    Compile,
    /// 编译流程内部失败
    Internal,
}

impl DiagnosticCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCategory::Input => "input",
            DiagnosticCategory::Security => "security",
            DiagnosticCategory::Syntax => "syntax",
            DiagnosticCategory::Compile => "compile",
            DiagnosticCategory::Internal => "internal",
        }
    }
}

/// 单条诊断，行列号相对用户输入（从 1 开始）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub category: DiagnosticCategory,
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Diagnostic {
    pub fn error(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: DiagnosticSeverity::Error,
            category,
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn warning(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: DiagnosticSeverity::Warning,
            ..Self::error(category, message)
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        };
        write!(f, "{severity}[{}]", self.category.as_str())?;
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, " {line}:{column}")?;
        }
        write!(f, ": {}", self.message)
    }
}
