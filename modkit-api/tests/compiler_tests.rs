//! 片段编译器测试

mod common;
use common::{compiler_with_game, diagnostics};
use modkit_api::{Compiler, DiagnosticCategory, DiagnosticSeverity, FragmentMode, COMPILER_MOD};
use modkit_core::{Value, VM};
use modkit_diag::Severity;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn test_expression_compiles_and_runs() {
    let result = Compiler::default().compile("1 + 2");
    assert!(result.success);
    assert!(result.errors.is_empty());

    let unit = result.unit.expect("unit on success");
    assert_eq!(unit.name(), result.generated_name);
    assert_eq!(unit.source().mode, FragmentMode::Expression);
    assert_eq!(unit.invoke(&VM::default()).unwrap(), Value::Int(3));
}

#[test]
fn test_statements_get_implicit_return() {
    let result = Compiler::default().compile("var x = 1;");
    assert!(result.success, "{:?}", result.errors);
    let unit = result.unit.unwrap();
    assert_eq!(unit.source().mode, FragmentMode::Statements);
    assert_eq!(unit.invoke(&VM::default()).unwrap(), Value::Null);

    // 未读取的变量产生警告，位置相对用户输入
    assert_eq!(result.warnings.len(), 1);
    let warning = &result.warnings[0];
    assert_eq!(warning.severity, DiagnosticSeverity::Warning);
    assert_eq!((warning.line, warning.column), (Some(1), Some(1)));
}

#[test]
fn test_syntax_error_has_no_unit() {
    let result = Compiler::default().compile("{{{");
    assert!(!result.success);
    assert!(result.unit.is_none());
    assert!(!result.errors.is_empty());
    assert_eq!(result.errors[0].category, DiagnosticCategory::Syntax);
    // 文件结尾落在生成的闭合花括号里，归到用户输入末尾
    assert_eq!((result.errors[0].line, result.errors[0].column), (Some(1), Some(4)));
}

#[test]
fn test_long_operator_chain_is_a_syntax_error() {
    let chains = [
        format!("1{}", "+1".repeat(10_000)),
        format!("a{}", ".b".repeat(10_000)),
        format!("f{}", "()".repeat(10_000)),
    ];
    for source in &chains {
        let result = Compiler::default().compile(source);
        assert!(!result.success);
        assert!(result.unit.is_none());
        assert_eq!(result.errors[0].category, DiagnosticCategory::Syntax);
        assert!(result.errors[0].message.contains("nesting too deep"));
    }
}

#[test]
fn test_error_positions_map_to_user_text() {
    let result = Compiler::default().compile("var a = 1;\nvar b = a +;");
    assert!(!result.success);
    let error = &result.errors[0];
    assert_eq!(error.line, Some(2));
    assert_eq!(error.column, Some(12));

    let result = Compiler::default().compile("missing + 1");
    assert_eq!(result.errors[0].category, DiagnosticCategory::Compile);
    assert_eq!((result.errors[0].line, result.errors[0].column), (Some(1), Some(1)));
    assert_eq!(result.errors[0].message, "undefined variable 'missing'");
}

#[test]
fn test_forced_modes() {
    let compiler = Compiler::default();
    let result = compiler.compile_expression("return 4;");
    assert_eq!(result.unit.unwrap().invoke(&VM::default()).unwrap(), Value::Int(4));

    let result = compiler.compile_statements("return 5");
    assert!(!result.success);
    assert_eq!(result.errors[0].category, DiagnosticCategory::Syntax);
}

#[test]
fn test_blocked_call_never_reaches_compiler() {
    // 后面的内容有语法错误；安全闸门先于编译执行，所以只会看到安全诊断
    let result = Compiler::default().compile("spawn(\"sh\") @@@ {");
    assert!(!result.success);
    assert!(result.unit.is_none());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].category, DiagnosticCategory::Security);
    assert!(result.errors[0].message.contains("spawn("));
}

#[test]
fn test_unsafe_block_rejected() {
    let result = Compiler::default().compile_statements("unsafe { var a = 1; }");
    assert_eq!(result.errors[0].category, DiagnosticCategory::Security);
    assert!(result.errors[0].message.contains("unsafe code"));
}

#[test]
fn test_allow_unsafe_does_not_open_the_gate() {
    let config = modkit_config::CompilerConfig {
        allow_unsafe: true,
        ..Default::default()
    };
    let result = Compiler::new(config).compile_statements("unsafe { var a = 1; }");
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].category, DiagnosticCategory::Security);
}

#[test]
fn test_security_rejection_is_reported() {
    let diagnostics = diagnostics();
    let compiler = Compiler::default().with_diagnostics(Arc::clone(&diagnostics));
    compiler.compile("fs.write(\"a\", 1)");

    let entries = diagnostics.errors(Some(COMPILER_MOD));
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Warning);
    assert!(entries[0].message.contains("fs."));
}

#[test]
fn test_empty_input_is_an_input_error() {
    let result = Compiler::default().compile("");
    assert!(!result.success);
    assert_eq!(result.errors[0].category, DiagnosticCategory::Input);
    assert_eq!(result.errors[0].message, "code cannot be empty");
}

#[test]
fn test_host_modules_are_importable() {
    let compiler = compiler_with_game();
    let result = compiler.compile("game.greet(\"bob\")");
    assert!(result.success, "{:?}", result.errors);
    let value = result.unit.unwrap().invoke(&VM::default()).unwrap();
    assert_eq!(value, Value::str("hello, bob"));

    // 框架模块被过滤，不会被隐式导入
    let result = compiler.compile("core_engine.SECRET");
    assert!(!result.success);
    assert_eq!(result.errors[0].message, "undefined variable 'core_engine'");
}

#[test]
fn test_generated_names_unique_under_concurrency() {
    let compiler = Arc::new(Compiler::default());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let compiler = Arc::clone(&compiler);
            thread::spawn(move || {
                (0..25)
                    .map(|j| compiler.compile(&format!("{i} + {j}")).generated_name)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut names = HashSet::new();
    for handle in handles {
        for name in handle.join().unwrap() {
            assert!(name.starts_with("__fragment_"));
            assert!(names.insert(name), "duplicate generated name");
        }
    }
    assert_eq!(names.len(), 200);
    assert_eq!(compiler.compiled_count(), 200);
}

#[test]
fn test_diagnostics_serialize() {
    let result = Compiler::default().compile("var x = ;");
    let json = serde_json::to_string(&result.errors).unwrap();
    assert!(json.contains("\"category\":\"syntax\""));
    assert!(json.contains("\"severity\":\"error\""));
}
