//! VM 执行测试
//!
//! 端到端测试：编译并执行片段代码

mod common;
use common::{compile_code, get_int, run_code, run_with_limits};
use modkit_core::{
    compile, Arity, CompileOptions, ExecutionLimits, ModuleRegistry, NativeModule, RuntimeErrorKind,
    Value, VM,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ===== 基础运算 =====

#[test]
fn test_basic_arithmetic() {
    assert_eq!(run_code("return 1 + 2;").unwrap(), Value::Int(3));
    assert_eq!(run_code("return 10 - 3;").unwrap(), Value::Int(7));
    assert_eq!(run_code("return 4 * 5;").unwrap(), Value::Int(20));
    // 整数除法截断
    assert_eq!(run_code("return 7 / 2;").unwrap(), Value::Int(3));
    assert_eq!(run_code("return 7.0 / 2;").unwrap(), Value::Float(3.5));
    assert_eq!(run_code("return 7 % 3;").unwrap(), Value::Int(1));
}

#[test]
fn test_operator_precedence() {
    assert_eq!(get_int(&run_code("return 2 + 3 * 4;").unwrap()), Some(14));
    assert_eq!(get_int(&run_code("return (2 + 3) * 4;").unwrap()), Some(20));
    assert_eq!(get_int(&run_code("return --5;").unwrap()), Some(5));
    assert_eq!(run_code("return not (1 == 2);").unwrap(), Value::Bool(true));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(run_code(r#"return "a" + "b";"#).unwrap(), Value::str("ab"));
    assert_eq!(run_code(r#"return "n=" + 3;"#).unwrap(), Value::str("n=3"));
    assert_eq!(run_code(r#"return 1.5 + "!";"#).unwrap(), Value::str("1.5!"));
    assert_eq!(run_code(r#"return 'it\'s';"#).unwrap(), Value::str("it's"));
}

#[test]
fn test_division_by_zero_is_an_error() {
    let err = run_code("var x = 1;\nreturn x / 0;").unwrap_err().runtime();
    assert_eq!(err.kind, RuntimeErrorKind::DivisionByZero);
    assert_eq!(err.line, 2);
    assert_eq!(err.function, "<script>");
    assert_eq!(err.to_string(), "division by zero");

    let err = run_code("return 1.0 % 0;").unwrap_err().runtime();
    assert_eq!(err.kind, RuntimeErrorKind::DivisionByZero);
}

#[test]
fn test_integer_overflow_is_an_error() {
    let err = run_code("return 9223372036854775807 + 1;").unwrap_err().runtime();
    assert_eq!(err.kind, RuntimeErrorKind::Overflow("+"));
}

#[test]
fn test_type_error() {
    let err = run_code(r#"return 1 - "a";"#).unwrap_err().runtime();
    assert!(matches!(err.kind, RuntimeErrorKind::TypeError(_)));
    assert_eq!(err.to_string(), "type error: cannot subtract int and str");
}

// ===== 控制流 =====

#[test]
fn test_if_elif_else() {
    let code = r#"
        var x = 15;
        if x > 20 {
            return "big";
        } elif x > 10 {
            return "medium";
        } else {
            return "small";
        }
    "#;
    assert_eq!(run_code(code).unwrap(), Value::str("medium"));
}

#[test]
fn test_while_break_continue() {
    let code = r#"
        var i = 0;
        var sum = 0;
        while true {
            i = i + 1;
            if i > 10 { break; }
            if i % 2 == 1 { continue; }
            sum = sum + i;
        }
        return sum;
    "#;
    assert_eq!(run_code(code).unwrap(), Value::Int(30));
}

#[test]
fn test_short_circuit() {
    // 右侧不会执行，否则会除零
    assert_eq!(run_code("return false and (1 / 0);").unwrap(), Value::Bool(false));
    assert_eq!(run_code("return true or (1 / 0);").unwrap(), Value::Bool(true));
    // 返回操作数本身
    assert_eq!(run_code("return null or 5;").unwrap(), Value::Int(5));
    assert_eq!(run_code("return 0 and 7;").unwrap(), Value::Int(7));
}

#[test]
fn test_block_scopes_shadow() {
    let code = r#"
        var x = 1;
        {
            var x = 2;
            x = x + 1;
        }
        return x;
    "#;
    assert_eq!(run_code(code).unwrap(), Value::Int(1));
}

// ===== 列表 =====

#[test]
fn test_lists_are_values() {
    let code = r#"
        var a = [1, 2];
        var b = a;
        b[0] = 9;
        return [a, b];
    "#;
    assert_eq!(run_code(code).unwrap().to_string(), "[[1, 2], [9, 2]]");
}

#[test]
fn test_list_index_errors() {
    let err = run_code("var a = [1]; return a[3];").unwrap_err().runtime();
    assert_eq!(err.kind, RuntimeErrorKind::IndexOutOfBounds { index: 3, len: 1 });
    let err = run_code("var a = [1]; return a[-1];").unwrap_err().runtime();
    assert_eq!(err.kind, RuntimeErrorKind::IndexOutOfBounds { index: -1, len: 1 });
}

#[test]
fn test_list_concatenation() {
    assert_eq!(run_code("return [1] + [2, 3];").unwrap().to_string(), "[1, 2, 3]");
}

// ===== 函数与模块 =====

#[test]
fn test_module_functions_and_recursion() {
    let code = r#"
        module calc {
            fn fib(n) {
                if n < 2 { return n; }
                return fib(n - 1) + fib(n - 2);
            }
        }
        return calc.fib(15);
    "#;
    assert_eq!(run_code(code).unwrap(), Value::Int(610));
}

#[test]
fn test_call_function_from_host() {
    let output = compile_code("module m { fn add(a, b) { return a + b; } }").unwrap();
    let vm = VM::default();
    assert_eq!(
        vm.call_function(&output.unit, "m", "add", vec![Value::Int(2), Value::Int(3)])
            .unwrap(),
        Value::Int(5)
    );

    let err = vm
        .call_function(&output.unit, "m", "add", vec![Value::Int(2)])
        .unwrap_err();
    assert!(matches!(err.kind, RuntimeErrorKind::ArityMismatch { found: 1, .. }));

    let err = vm
        .call_function(&output.unit, "m", "missing", Vec::new())
        .unwrap_err();
    assert!(matches!(err.kind, RuntimeErrorKind::UndefinedMember { .. }));
}

#[test]
fn test_function_without_return_yields_null() {
    let code = "module m { fn nothing() { var x = 1; x = 2; } } return m.nothing();";
    assert_eq!(run_code(code).unwrap(), Value::Null);
}

#[test]
fn test_not_callable() {
    let err = run_code("var x = 3; return x();").unwrap_err().runtime();
    assert_eq!(err.kind, RuntimeErrorKind::NotCallable("int"));
}

// ===== 原生模块 =====

#[test]
fn test_prelude_modules() {
    let code = r#"
        import std;
        import math;
        import text;
        return [len(range(4)), math.floor(2.7), text.upper("ab"), type(1.5), to_string(2.0)];
    "#;
    assert_eq!(
        run_code(code).unwrap().to_string(),
        r#"[4, 2, "AB", "float", "2.0"]"#
    );
}

#[test]
fn test_native_error_is_reported() {
    let err = run_code(r#"import std; assert(false, "boom"); return 1;"#)
        .unwrap_err()
        .runtime();
    assert_eq!(
        err.kind,
        RuntimeErrorKind::Native {
            name: "std.assert".into(),
            message: "assertion failed: boom".into()
        }
    );
}

#[test]
fn test_native_panic_is_contained() {
    let mut registry = ModuleRegistry::with_prelude();
    registry.register(Arc::new(
        NativeModule::new("host").function("explode", Arity::Exact(0), |_| panic!("host bug")),
    ));
    let output = compile(
        "import host; return host.explode();",
        &registry,
        &CompileOptions::default(),
        false,
    )
    .unwrap();

    let err = VM::default().run_script(&output.unit).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::NativePanic("host.explode".into()));
}

#[test]
fn test_native_arity_checked() {
    let err = run_code("import math; return math.sqrt(1, 2);").unwrap_err().runtime();
    assert!(matches!(err.kind, RuntimeErrorKind::ArityMismatch { found: 2, .. }));
}

// ===== 执行限制 =====

#[test]
fn test_instruction_limit() {
    let limits = ExecutionLimits {
        max_instructions: Some(10_000),
        timeout: None,
        ..ExecutionLimits::default()
    };
    let err = run_with_limits("while true { }", limits).unwrap_err().runtime();
    assert_eq!(err.kind, RuntimeErrorKind::InstructionLimit(10_000));
    assert!(err.is_limit());
}

#[test]
fn test_timeout() {
    let limits = ExecutionLimits {
        max_instructions: None,
        timeout: Some(Duration::from_millis(50)),
        ..ExecutionLimits::default()
    };
    let err = run_with_limits("var i = 0; while true { i = i + 1; if i > 1000000 { i = 0; } }", limits)
        .unwrap_err()
        .runtime();
    assert_eq!(err.kind, RuntimeErrorKind::Timeout(50));
}

#[test]
fn test_interrupt_from_another_thread() {
    let output = compile_code("while true { }").unwrap();
    let vm = VM::new(ExecutionLimits::unlimited());
    let handle = vm.interrupt_handle();

    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.interrupt();
    });
    let err = vm.run_script(&output.unit).unwrap_err();
    trigger.join().unwrap();
    assert_eq!(err.kind, RuntimeErrorKind::Interrupted);

    // 重置后可以再次执行
    vm.interrupt_handle().reset();
    let output = compile_code("return 1;").unwrap();
    assert_eq!(vm.run_script(&output.unit).unwrap(), Value::Int(1));
}

#[test]
fn test_call_depth_limit() {
    let code = "module m { fn down(n) { return down(n + 1); } } return m.down(0);";
    let err = run_code(code).unwrap_err().runtime();
    assert_eq!(err.kind, RuntimeErrorKind::CallDepthExceeded(64));
    assert_eq!(err.function, "m.down");
}

#[test]
fn test_stack_limit() {
    let limits = ExecutionLimits {
        max_stack: 4,
        ..ExecutionLimits::default()
    };
    let err = run_with_limits("return [1, 2, 3, 4, 5];", limits)
        .unwrap_err()
        .runtime();
    assert_eq!(err.kind, RuntimeErrorKind::StackOverflow);
}

#[test]
fn test_doubling_string_hits_value_limit() {
    let code = r#"var s = "x"; var i = 0; while i < 26 { s = s + s; i = i + 1; } return s;"#;
    let err = run_code(code).unwrap_err().runtime();
    assert_eq!(err.kind, RuntimeErrorKind::ValueTooLarge(1 << 20));
    assert!(err.is_limit());
    assert_eq!(err.line, 1);
}

#[test]
fn test_value_limit_covers_lists_and_natives() {
    let limits = ExecutionLimits {
        max_value_len: 8,
        ..ExecutionLimits::default()
    };
    let err = run_with_limits("var l = [1, 2, 3]; while true { l = l + l; }", limits.clone())
        .unwrap_err()
        .runtime();
    assert_eq!(err.kind, RuntimeErrorKind::ValueTooLarge(8));

    let err = run_with_limits("return [1, 2, 3, 4, 5, 6, 7, 8, 9];", limits.clone())
        .unwrap_err()
        .runtime();
    assert_eq!(err.kind, RuntimeErrorKind::ValueTooLarge(8));

    let err = run_with_limits(r#"import text; return text.replace("abc", "b", "bbbbbbbb");"#, limits.clone())
        .unwrap_err()
        .runtime();
    assert_eq!(err.kind, RuntimeErrorKind::ValueTooLarge(8));

    // 限制以内照常执行
    assert_eq!(
        run_with_limits(r#"return "abcd" + "efgh";"#, limits).unwrap(),
        Value::str("abcdefgh")
    );
}

#[test]
fn test_vm_is_shareable_across_threads() {
    let output = Arc::new(compile_code("module m { fn sq(x) { return x * x; } }").unwrap());
    let vm = Arc::new(VM::default());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let vm = Arc::clone(&vm);
            let output = Arc::clone(&output);
            thread::spawn(move || vm.call_function(&output.unit, "m", "sq", vec![Value::Int(i)]))
        })
        .collect();
    let results: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
    assert_eq!(results, vec![Value::Int(0), Value::Int(1), Value::Int(4), Value::Int(9)]);
}
