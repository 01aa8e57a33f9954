//! 沙箱片段编译器
//!
//! 流程：模式检测 → 组装 → 安全闸门 → 词法/语法/字节码编译 → [`CompilationResult`]。
//! 所有失败（包括流程内部 panic）都以结果值返回。

use crate::diagnostic::{Diagnostic, DiagnosticCategory};
use crate::fragment::{assemble, AssembledSource, FragmentMode, FRAGMENT_PREFIX};
use crate::outcome::{FailureReason, Outcome};
use crate::references::{HostReferences, ReferenceProvider};
use crate::result::{CompilationResult, LoadedUnit};
use crate::security::SecurityPolicy;
use modkit_config::CompilerConfig;
use modkit_core::{compile, BuildError, CompileOptions, CompileWarning, ModuleRegistry};
use modkit_diag::Diagnostics;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 上报诊断时使用的 mod id
pub const COMPILER_MOD: &str = "modkit.compiler";

/// 片段编译器，可在多个线程间共享
pub struct Compiler {
    config: CompilerConfig,
    policy: SecurityPolicy,
    references: Arc<dyn ReferenceProvider>,
    diagnostics: Option<Arc<Diagnostics>>,
    counter: AtomicU64,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        let references = Arc::new(HostReferences::new(config.excluded_module_prefixes.clone()));
        Compiler {
            config,
            policy: SecurityPolicy::default(),
            references,
            diagnostics: None,
            counter: AtomicU64::new(0),
        }
    }

    pub fn with_references(mut self, references: Arc<dyn ReferenceProvider>) -> Self {
        self.references = references;
        self
    }

    pub fn with_policy(mut self, policy: SecurityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 安全拒绝与内部失败会上报到聚合器
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.attach_diagnostics(diagnostics);
        self
    }

    pub(crate) fn attach_diagnostics(&mut self, diagnostics: Arc<Diagnostics>) {
        self.diagnostics = Some(diagnostics);
    }

    /// 是否已连接诊断聚合器
    pub fn has_diagnostics(&self) -> bool {
        self.diagnostics.is_some()
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// 已分配的生成名数量
    pub fn compiled_count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// 自动检测模式并编译
    pub fn compile(&self, text: &str) -> CompilationResult {
        self.compile_with_mode(text, None)
    }

    /// 作为表达式编译
    pub fn compile_expression(&self, text: &str) -> CompilationResult {
        self.compile_with_mode(text, Some(FragmentMode::Expression))
    }

    /// 作为语句编译
    pub fn compile_statements(&self, text: &str) -> CompilationResult {
        self.compile_with_mode(text, Some(FragmentMode::Statements))
    }

    fn compile_with_mode(&self, text: &str, mode: Option<FragmentMode>) -> CompilationResult {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("{FRAGMENT_PREFIX}{n}");

        let outcome = catch_unwind(AssertUnwindSafe(|| self.pipeline(text, mode, &name)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                self.report_error(format!("{name}: compiler panicked: {message}"));
                Outcome::Failure(FailureReason::Internal(format!(
                    "internal compiler error: {message}"
                )))
            });

        let result = CompilationResult::from_outcome(outcome, name);
        tracing::debug!(
            target: "modkit::api",
            name = %result.generated_name,
            success = result.success,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "compiled fragment"
        );
        result
    }

    fn pipeline(
        &self,
        text: &str,
        mode: Option<FragmentMode>,
        name: &str,
    ) -> Outcome<(LoadedUnit, Vec<Diagnostic>)> {
        if text.trim().is_empty() {
            return Outcome::Failure(FailureReason::Input("code cannot be empty".to_string()));
        }

        let mode = mode.unwrap_or_else(|| FragmentMode::detect(text));
        let modules = self.references.modules();
        let registry = {
            let mut registry = ModuleRegistry::new();
            for module in modules {
                registry.register(module);
            }
            registry
        };
        let imports = self.implicit_imports(&registry);
        let source = assemble(name, &imports, text, mode);
        tracing::trace!(target: "modkit::api", name, mode = %mode, "\n{}", source.text);

        if let Err(violation) = self.policy.check(&source.text) {
            tracing::warn!(
                target: "modkit::api",
                name,
                rule = %violation.rule,
                pattern = %violation.pattern,
                "fragment rejected by security policy"
            );
            self.report_warning(format!("{name}: {violation}"));
            return Outcome::Failure(FailureReason::Security(violation));
        }

        let options = CompileOptions::from(&self.config);
        match compile(&source.text, &registry, &options, self.config.allow_unsafe) {
            Ok(output) => {
                let warnings = map_warnings(&source, &output.warnings);
                match LoadedUnit::new(output.unit, source) {
                    Some(unit) => Outcome::Success((unit, warnings)),
                    None => Outcome::Failure(FailureReason::Internal(format!(
                        "generated unit '{name}' has no entry function"
                    ))),
                }
            }
            Err(BuildError::Parse(err)) => {
                let (line, column) = source.map_position(err.coordinate.line, err.coordinate.column);
                Outcome::Failure(FailureReason::Compile {
                    errors: vec![
                        Diagnostic::error(DiagnosticCategory::Syntax, err.kind.to_string()).at(line, column),
                    ],
                    warnings: Vec::new(),
                })
            }
            Err(BuildError::Compile(failure)) => {
                let errors = failure
                    .errors
                    .iter()
                    .map(|err| {
                        let (line, column) = source.map_position(err.coordinate.line, err.coordinate.column);
                        Diagnostic::error(DiagnosticCategory::Compile, err.kind.to_string()).at(line, column)
                    })
                    .collect();
                Outcome::Failure(FailureReason::Compile {
                    errors,
                    warnings: map_warnings(&source, &failure.warnings),
                })
            }
        }
    }

    /// 配置的白名单 + 提供者的全部模块，只保留实际存在的
    fn implicit_imports(&self, registry: &ModuleRegistry) -> Vec<String> {
        let mut imports: Vec<String> = Vec::new();
        let configured = self.config.implicit_imports.iter().cloned();
        for name in configured.chain(registry.names()) {
            if imports.contains(&name) {
                continue;
            }
            if registry.contains(&name) {
                imports.push(name);
            } else {
                tracing::debug!(target: "modkit::api", module = %name, "implicit import not available");
            }
        }
        imports
    }

    fn report_warning(&self, message: String) {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.warn(Some(COMPILER_MOD), message);
        }
    }

    fn report_error(&self, message: String) {
        tracing::error!(target: "modkit::api", "{message}");
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.report(Some(COMPILER_MOD), message);
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new(CompilerConfig::default())
    }
}

fn map_warnings(source: &AssembledSource, warnings: &[CompileWarning]) -> Vec<Diagnostic> {
    warnings
        .iter()
        .map(|warning| {
            let (line, column) = source.map_position(warning.coordinate.line, warning.coordinate.column);
            Diagnostic::warning(DiagnosticCategory::Compile, warning.message.clone()).at(line, column)
        })
        .collect()
}

/// 从 panic 负载中取出消息
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
