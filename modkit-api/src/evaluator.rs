//! 求值器：编译、执行、记录历史

use crate::compiler::{panic_message, Compiler};
use crate::outcome::{FailureReason, Outcome};
use crate::result::{display_value, CompilationResult, EvaluationRecord, EvaluationResult};
use modkit_config::SdkConfig;
use modkit_core::{ExecutionLimits, InterruptHandle, Value, VM};
use modkit_diag::Diagnostics;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// 上报执行失败时使用的 mod id
pub const EVALUATOR_MOD: &str = "modkit.evaluator";

/// 单会话求值器
///
/// 历史记录属于一个会话，不做内部同步；跨线程共享时需要外部加锁。
pub struct Evaluator {
    compiler: Arc<Compiler>,
    limits: ExecutionLimits,
    interrupt: InterruptHandle,
    diagnostics: Option<Arc<Diagnostics>>,
    history: Vec<EvaluationRecord>,
    history_limit: Option<usize>,
}

impl Evaluator {
    pub fn new(compiler: Arc<Compiler>) -> Self {
        Evaluator {
            compiler,
            limits: ExecutionLimits::default(),
            interrupt: InterruptHandle::new(),
            diagnostics: None,
            history: Vec::new(),
            history_limit: None,
        }
    }

    /// 按 SDK 配置创建编译器与执行限制
    pub fn from_config(config: &SdkConfig) -> Self {
        let compiler = Arc::new(Compiler::new(config.compiler.clone()));
        Evaluator::new(compiler)
            .with_limits(ExecutionLimits::from(&config.limits))
            .with_history_limit(config.evaluator.history_limit)
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// 历史上限，超出后丢弃最旧的记录
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self.trim_history();
        self
    }

    /// 执行失败上报到聚合器
    ///
    /// 编译器只被本求值器持有时（例如 [`Evaluator::from_config`]）也连接到同一个聚合器；
    /// 共享的编译器保留自己的设置。
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        if let Some(compiler) = Arc::get_mut(&mut self.compiler) {
            compiler.attach_diagnostics(Arc::clone(&diagnostics));
        }
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn compiler(&self) -> &Arc<Compiler> {
        &self.compiler
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// 可在其他线程中断当前求值
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// 编译并执行，结果追加到历史
    pub fn evaluate(&mut self, text: &str) -> EvaluationResult {
        let started = Instant::now();
        let compiled = self.compiler.compile(text);
        let generated_name = compiled.generated_name.clone();
        let warnings = compiled.warning_messages();

        let outcome = self.execute(&compiled);
        let result = match outcome {
            Outcome::Success(value) => EvaluationResult {
                success: true,
                display: display_value(value.as_ref()),
                value,
                errors: Vec::new(),
                warnings,
                generated_name,
                elapsed: started.elapsed(),
            },
            Outcome::Failure(reason) => {
                let errors = reason.messages();
                EvaluationResult {
                    success: false,
                    value: None,
                    display: errors.join("\n"),
                    errors,
                    warnings,
                    generated_name,
                    elapsed: started.elapsed(),
                }
            }
        };

        tracing::debug!(
            target: "modkit::api",
            name = %result.generated_name,
            success = result.success,
            elapsed_us = result.elapsed.as_micros() as u64,
            "evaluated fragment"
        );
        self.history.push(EvaluationRecord {
            input: text.to_string(),
            result: result.clone(),
        });
        self.trim_history();
        result
    }

    /// 新 VM 中调用入口函数；null 返回值视为空
    fn execute(&self, compiled: &CompilationResult) -> Outcome<Option<Value>> {
        compiled.outcome().and_then(|unit| {
            self.interrupt.reset();
            let vm = VM::with_interrupt(self.limits.clone(), self.interrupt.clone());
            match catch_unwind(AssertUnwindSafe(|| unit.invoke(&vm))) {
                Ok(Ok(Value::Null)) => Outcome::Success(None),
                Ok(Ok(value)) => Outcome::Success(Some(value)),
                Ok(Err(err)) => {
                    let message = unit.describe_error(&err);
                    if let Some(diagnostics) = &self.diagnostics {
                        diagnostics.warn(Some(EVALUATOR_MOD), format!("{}: {message}", unit.name()));
                    }
                    Outcome::Failure(FailureReason::Execution(message))
                }
                Err(payload) => {
                    let message = format!("internal error: {}", panic_message(payload.as_ref()));
                    tracing::error!(target: "modkit::api", name = unit.name(), "{message}");
                    if let Some(diagnostics) = &self.diagnostics {
                        diagnostics.report(Some(EVALUATOR_MOD), format!("{}: {message}", unit.name()));
                    }
                    Outcome::Failure(FailureReason::Internal(message))
                }
            }
        })
    }

    /// 按调用顺序排列的历史
    pub fn history(&self) -> &[EvaluationRecord] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn trim_history(&mut self) {
        if let Some(limit) = self.history_limit {
            let excess = self.history.len().saturating_sub(limit);
            self.history.drain(..excess);
        }
    }
}
