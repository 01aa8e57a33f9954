//! Modkit - modding SDK for hosts with a native object system
//!
//! 三个相互独立的服务，共享同一套配置与诊断：
//!
//! ```text
//! modkit-config   - 纯配置数据（serde/JSON）
//! modkit-diag     - 按 mod 隔离、去重、限速的诊断聚合器
//! modkit-interop  - 宿主字段偏移解析与类型化字段访问
//! modkit-core     - 片段语言：词法、语法、字节码编译器与受限 VM
//! modkit-api      - 安全闸门、片段组装、编译结果与会话求值器
//! ```
//!
//! # Quick Start
//!
//! ```
//! let mut evaluator = modkit::evaluator();
//! let result = evaluator.evaluate("var x = 6; return x * 7;");
//! assert!(result.success);
//! assert_eq!(result.display, "42");
//! ```

mod config;

pub use config::{config, diagnostics, init_config, is_initialized};

pub use modkit_api as api;
pub use modkit_config as settings;
pub use modkit_core as core;
pub use modkit_diag as diag;
pub use modkit_interop as interop;

pub use modkit_api::{
    CompilationResult, Compiler, Diagnostic, DiagnosticCategory, DiagnosticSeverity,
    EvaluationResult, Evaluator, FragmentMode, HostReferences, Outcome, ReferenceProvider,
    SecurityPolicy,
};
pub use modkit_config::{LogConfig, LogLevel, Phase, SdkConfig};
pub use modkit_core::{ExecutionLimits, InterruptHandle, ModuleRegistry, NativeModule, Value, VM};
pub use modkit_diag::{Diagnostics, ErrorEntry, Severity};
pub use modkit_interop::{
    ClassHandle, HostMemory, LayoutDump, NativeRuntime, ObjectView, OffsetResolver, UNRESOLVED,
};

use std::sync::Arc;

/// 按全局配置创建编译器，失败上报到全局诊断聚合器
pub fn compiler() -> Compiler {
    Compiler::new(config().compiler.clone()).with_diagnostics(diagnostics())
}

/// 按全局配置创建会话求值器，失败上报到全局诊断聚合器
pub fn evaluator() -> Evaluator {
    Evaluator::from_config(config()).with_diagnostics(diagnostics())
}

/// 为宿主运行时创建偏移解析器，使用全局互操作配置与诊断聚合器
pub fn offset_resolver(runtime: Arc<dyn NativeRuntime>) -> OffsetResolver {
    OffsetResolver::new(runtime, diagnostics(), config().interop.clone())
}
