//! 集成测试 - 配置、诊断、互操作与片段求值串联

mod common;

use common::{game_dump, FlatMemory};
use modkit::api::{COMPILER_MOD, EVALUATOR_MOD};
use modkit::interop::INTEROP_MOD;
use modkit::{
    Compiler, Diagnostics, Evaluator, ExecutionLimits, NativeRuntime, ObjectView, OffsetResolver,
    SdkConfig, Severity, UNRESOLVED,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn resolver(diagnostics: Arc<Diagnostics>) -> OffsetResolver {
    let runtime: Arc<dyn NativeRuntime> = Arc::new(game_dump());
    OffsetResolver::new(runtime, diagnostics, SdkConfig::default().interop)
}

#[test]
fn test_facade_singletons() {
    let mut config = SdkConfig::default();
    config.evaluator.history_limit = Some(2);
    config.limits.max_instructions = Some(10_000);
    assert!(modkit::init_config(config.clone()).is_ok());
    assert!(modkit::is_initialized());
    assert!(modkit::init_config(config).is_err());

    let mut evaluator = modkit::evaluator();
    for _ in 0..3 {
        assert!(evaluator.evaluate("1 + 1").success);
    }
    assert_eq!(evaluator.history().len(), 2);

    let result = evaluator.evaluate("while true { }");
    assert!(!result.success);
    assert!(result.display.contains("instruction limit"));

    let reported = modkit::diagnostics().errors(Some(EVALUATOR_MOD));
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].severity, Severity::Warning);
    assert!(Arc::ptr_eq(&modkit::diagnostics(), &modkit::diagnostics()));

    // 会话内部的编译器同样连接到全局聚合器
    assert!(evaluator.compiler().has_diagnostics());
    assert!(!evaluator.evaluate("process.spawn(\"shell\")").success);
    let rejected = modkit::diagnostics().errors(Some(COMPILER_MOD));
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].message.contains("security violation"));
}

#[test]
fn test_config_file_drives_evaluator() {
    let config = SdkConfig::from_json(
        r#"{ "limits": { "timeout_ms": 50, "max_instructions": null }, "evaluator": { "history_limit": 1 } }"#,
    )
    .unwrap();
    let mut evaluator = Evaluator::from_config(&config);
    assert_eq!(evaluator.limits().timeout, Some(Duration::from_millis(50)));

    let result = evaluator.evaluate("while true { }");
    assert!(!result.success);
    assert!(result.display.contains("timed out"), "{}", result.display);

    evaluator.evaluate("2");
    assert_eq!(evaluator.history().len(), 1);
    assert_eq!(evaluator.history()[0].result.display, "2");
}

#[test]
fn test_failures_flow_into_diagnostics() {
    let diagnostics = Diagnostics::with_defaults();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    diagnostics.subscribe(move |entry: &modkit::ErrorEntry| {
        sink.lock().unwrap().push(entry.mod_id.clone());
    });

    let compiler = Arc::new(Compiler::default().with_diagnostics(Arc::clone(&diagnostics)));
    let mut evaluator = Evaluator::new(compiler)
        .with_limits(ExecutionLimits::default())
        .with_diagnostics(Arc::clone(&diagnostics));

    assert!(!evaluator.evaluate("process.spawn(\"shell\")").success);
    assert!(!evaluator.evaluate("10 / 0").success);

    let security = diagnostics.errors(Some(COMPILER_MOD));
    assert_eq!(security.len(), 1);
    assert!(security[0].message.contains("security violation"));
    let runtime = diagnostics.errors(Some(EVALUATOR_MOD));
    assert_eq!(runtime.len(), 1);
    assert!(runtime[0].message.contains("division by zero"));

    assert_eq!(*seen.lock().unwrap(), vec![COMPILER_MOD, EVALUATOR_MOD]);
}

#[test]
fn test_offsets_from_layout_dump() {
    let diagnostics = Diagnostics::with_defaults();
    let resolver = resolver(Arc::clone(&diagnostics));
    let character = resolver.resolve_class("", "Game", "Character");
    assert!(character.is_valid());

    assert_eq!(resolver.get_or_resolve(character, "Health"), 0x18);
    assert_eq!(resolver.get_or_resolve(character, "Speed"), 0x1C);
    assert_eq!(resolver.get_or_resolve(character, "Level"), 0x24);
    assert_eq!(resolver.get_or_resolve(character, "CachedPtr"), 0x10);
    assert!(diagnostics.errors(Some(INTEROP_MOD)).is_empty());

    assert_eq!(resolver.get_or_resolve(character, "Mana"), UNRESOLVED);
    assert_eq!(resolver.get_or_resolve(character, "Mana"), UNRESOLVED);
    let warnings = diagnostics.errors(Some(INTEROP_MOD));
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
}

#[test]
fn test_base_type_initialization() {
    let resolver = resolver(Diagnostics::with_defaults());
    let base = resolver.initialize();
    assert!(base.is_valid());
    assert_eq!(resolver.base_class(), base);
}

#[test]
fn test_typed_field_access() {
    let resolver = resolver(Diagnostics::with_defaults());
    let character = resolver.resolve_class("", "Game", "Character");
    let memory = FlatMemory::new(0x100);
    let view = ObjectView::new(0x40, character);

    assert!(view.write(&resolver, &memory, "Health", 75i32));
    assert!(view.write(&resolver, &memory, "IsAlive", true));
    assert_eq!(view.read::<i32>(&resolver, &memory, "Health"), Some(75));
    assert_eq!(view.read::<bool>(&resolver, &memory, "IsAlive"), Some(true));
    assert_eq!(view.read::<f32>(&resolver, &memory, "Speed"), Some(0.0));

    assert_eq!(view.read::<i32>(&resolver, &memory, "Mana"), None);
    assert!(!view.write(&resolver, &memory, "Mana", 1i32));
}
