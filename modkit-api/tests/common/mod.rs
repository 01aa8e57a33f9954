//! 测试辅助工具

#![allow(dead_code)]

use modkit_api::{Compiler, Evaluator, HostReferences};
use modkit_config::CompilerConfig;
use modkit_core::{Arity, NativeModule, Value};
use modkit_diag::Diagnostics;
use std::sync::Arc;

/// 默认配置的求值器
pub fn evaluator() -> Evaluator {
    Evaluator::new(Arc::new(Compiler::default()))
}

/// 带有 `game` 宿主模块的编译器
pub fn compiler_with_game() -> Compiler {
    let references = HostReferences::new(CompilerConfig::default().excluded_module_prefixes)
        .with_module(
            NativeModule::new("game")
                .constant("MAX_PLAYERS", 16i64)
                .function("greet", Arity::Exact(1), |args| {
                    Ok(Value::str(format!("hello, {}", args[0])))
                }),
        )
        .with_module(NativeModule::new("core_engine").constant("SECRET", 1i64));
    Compiler::default().with_references(Arc::new(references))
}

/// 记录上报的聚合器
pub fn diagnostics() -> Arc<Diagnostics> {
    Diagnostics::with_defaults()
}
