//! 编译与求值结果

use crate::diagnostic::Diagnostic;
use crate::fragment::{AssembledSource, ENTRY_FUNCTION};
use crate::outcome::{FailureReason, Outcome};
use modkit_core::runtime::bytecode::Function;
use modkit_core::{RuntimeError, Unit, Value, VM};
use std::sync::Arc;
use std::time::Duration;

/// 已加载的单元：字节码 + 导入表 + 入口函数
#[derive(Debug)]
pub struct LoadedUnit {
    unit: Unit,
    entry: Arc<Function>,
    source: AssembledSource,
}

impl LoadedUnit {
    /// 单元中缺少入口函数时返回 None
    pub(crate) fn new(unit: Unit, source: AssembledSource) -> Option<Self> {
        let entry = unit.function(&source.module, ENTRY_FUNCTION)?;
        Some(LoadedUnit {
            unit,
            entry,
            source,
        })
    }

    /// 生成的模块名
    pub fn name(&self) -> &str {
        &self.source.module
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// 组装后的完整源码
    pub fn source(&self) -> &AssembledSource {
        &self.source
    }

    /// 在给定 VM 中调用入口函数
    pub fn invoke(&self, vm: &VM) -> Result<Value, RuntimeError> {
        vm.call(&self.unit, &self.entry, Vec::new())
    }

    /// 运行时错误消息，行号映射回用户输入
    pub fn describe_error(&self, error: &RuntimeError) -> String {
        if error.line == 0 {
            format!("runtime error: {error}")
        } else {
            format!(
                "runtime error: {error} (line {})",
                self.source.map_line(error.line)
            )
        }
    }
}

/// 编译结果
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub success: bool,
    /// 仅在成功时存在
    pub unit: Option<Arc<LoadedUnit>>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub generated_name: String,
}

impl CompilationResult {
    pub(crate) fn from_outcome(
        outcome: Outcome<(LoadedUnit, Vec<Diagnostic>)>,
        generated_name: String,
    ) -> Self {
        match outcome {
            Outcome::Success((unit, warnings)) => CompilationResult {
                success: true,
                unit: Some(Arc::new(unit)),
                errors: Vec::new(),
                warnings,
                generated_name,
            },
            Outcome::Failure(reason) => {
                let (errors, warnings) = reason.into_diagnostics();
                CompilationResult {
                    success: false,
                    unit: None,
                    errors,
                    warnings,
                    generated_name,
                }
            }
        }
    }

    /// 作为统一结果类型
    pub fn outcome(&self) -> Outcome<Arc<LoadedUnit>> {
        match &self.unit {
            Some(unit) if self.success => Outcome::Success(Arc::clone(unit)),
            _ => Outcome::Failure(FailureReason::Compile {
                errors: self.errors.clone(),
                warnings: self.warnings.clone(),
            }),
        }
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

/// 求值结果
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub success: bool,
    /// 返回值；null 表示为 None
    pub value: Option<Value>,
    /// 显示形式：字符串带引号，空值为 `null`
    pub display: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub generated_name: String,
    /// 编译 + 执行耗时
    pub elapsed: Duration,
}

/// 值的显示形式
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(value) => value.repr(),
    }
}

/// 一次求值的历史记录
#[derive(Debug, Clone)]
pub struct EvaluationRecord {
    pub input: String,
    pub result: EvaluationResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(None), "null");
        assert_eq!(display_value(Some(&Value::Null)), "null");
        assert_eq!(display_value(Some(&Value::str("hi\n"))), "\"hi\\n\"");
        assert_eq!(display_value(Some(&Value::Float(2.5))), "2.5");
        assert_eq!(
            display_value(Some(&Value::list(vec![Value::Int(1), Value::str("a")]))),
            "[1, \"a\"]"
        );
    }
}
