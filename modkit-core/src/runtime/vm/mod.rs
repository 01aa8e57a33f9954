//! 虚拟机
//!
//! 每次执行都在独立的 [`Execution`](execution) 状态中进行，`VM` 本身只持有执行限制与中断句柄，
//! 因此同一个 `VM` 可以被多个线程共享。

mod error;
mod execution;
pub mod operators;

pub use error::{RuntimeError, RuntimeErrorKind, RuntimeResult};

use crate::runtime::bytecode::Function;
use crate::runtime::compiler::Unit;
use crate::runtime::value::Value;
use modkit_config::LimitConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 每隔多少条指令检查一次超时与中断
pub const CHECK_INTERVAL: u64 = 1024;

/// 执行限制
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// 最大执行指令数
    pub max_instructions: Option<u64>,
    /// 墙钟超时
    pub timeout: Option<Duration>,
    pub max_call_depth: usize,
    /// 操作数栈上限（值个数）
    pub max_stack: usize,
    /// 单个值的大小上限（字符串字节数 / 列表元素数）
    pub max_value_len: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        ExecutionLimits::from(&LimitConfig::default())
    }
}

impl ExecutionLimits {
    /// 不限制指令数与时间，仅保留栈、调用深度与值大小
    pub fn unlimited() -> Self {
        ExecutionLimits {
            max_instructions: None,
            timeout: None,
            ..Self::default()
        }
    }
}

impl From<&LimitConfig> for ExecutionLimits {
    fn from(config: &LimitConfig) -> Self {
        ExecutionLimits {
            max_instructions: config.max_instructions,
            timeout: config.timeout_ms.map(Duration::from_millis),
            max_call_depth: config.max_call_depth,
            max_stack: config.max_stack_size,
            max_value_len: config.max_value_len,
        }
    }
}

/// 中断句柄，可以在其他线程触发
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求中断；正在运行的执行会在下一次检查时停止
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 清除中断标记
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 虚拟机
#[derive(Debug, Clone, Default)]
pub struct VM {
    limits: ExecutionLimits,
    interrupt: InterruptHandle,
}

impl VM {
    pub fn new(limits: ExecutionLimits) -> Self {
        VM {
            limits,
            interrupt: InterruptHandle::new(),
        }
    }

    /// 使用外部提供的中断句柄
    pub fn with_interrupt(limits: ExecutionLimits, interrupt: InterruptHandle) -> Self {
        VM { limits, interrupt }
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// 执行单元的顶层脚本；没有顶层语句时返回 null
    pub fn run_script(&self, unit: &Unit) -> RuntimeResult<Value> {
        match &unit.script {
            Some(script) => self.call(unit, script, Vec::new()),
            None => Ok(Value::Null),
        }
    }

    /// 按 (模块, 函数) 名调用
    pub fn call_function(
        &self,
        unit: &Unit,
        module: &str,
        name: &str,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        let function = unit.function(module, name).ok_or_else(|| {
            RuntimeError::new(RuntimeErrorKind::UndefinedMember {
                owner: module.to_string(),
                member: name.to_string(),
            })
        })?;
        self.call(unit, &function, args)
    }

    /// 调用单元中的函数
    pub fn call(&self, unit: &Unit, function: &Arc<Function>, args: Vec<Value>) -> RuntimeResult<Value> {
        if args.len() != function.arity {
            return Err(RuntimeError {
                kind: RuntimeErrorKind::ArityMismatch {
                    name: function.name.clone(),
                    expected: function.arity.to_string(),
                    found: args.len(),
                },
                line: 0,
                function: function.name.clone(),
            });
        }
        tracing::debug!(target: "modkit::vm", function = %function.name, "execute");
        let result = execution::Execution::new(unit, &self.limits, &self.interrupt).run(function, args);
        if let Err(err) = &result {
            tracing::debug!(
                target: "modkit::vm",
                function = %err.function,
                line = err.line,
                error = %err,
                "execution failed"
            );
        }
        result
    }
}
