//! 测试辅助工具
//!
//! 提供端到端测试的辅助函数

#![allow(dead_code)]

use modkit_core::{
    compile, CompileOptions, CompileOutput, ExecutionLimits, ModuleRegistry, RuntimeError, Value, VM,
};

/// 编译并执行代码，返回顶层 `return` 的值
///
/// # Example
/// ```
/// let value = run_code("var x = 5; return x;").unwrap();
/// ```
pub fn run_code(code: &str) -> Result<Value, ExecError> {
    run_with_limits(code, ExecutionLimits::default())
}

/// 使用指定执行限制运行
pub fn run_with_limits(code: &str, limits: ExecutionLimits) -> Result<Value, ExecError> {
    let output = compile_code(code)?;
    VM::new(limits)
        .run_script(&output.unit)
        .map_err(ExecError::Runtime)
}

/// 只编译（带 prelude）
pub fn compile_code(code: &str) -> Result<CompileOutput, ExecError> {
    compile(
        code,
        &ModuleRegistry::with_prelude(),
        &CompileOptions::default(),
        false,
    )
    .map_err(|e| ExecError::Build(e.to_string()))
}

/// 执行错误
#[derive(Debug)]
pub enum ExecError {
    Build(String),
    Runtime(RuntimeError),
}

impl ExecError {
    pub fn runtime(self) -> RuntimeError {
        match self {
            ExecError::Runtime(err) => err,
            ExecError::Build(message) => panic!("expected runtime error, got build error: {message}"),
        }
    }

    pub fn build(self) -> String {
        match self {
            ExecError::Build(message) => message,
            ExecError::Runtime(err) => panic!("expected build error, got runtime error: {err}"),
        }
    }
}

/// 获取整数返回值
pub fn get_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        _ => None,
    }
}
