use super::text::MAX_TEXT_LEN;
use super::{expected, Arity, NativeModule};
use crate::runtime::value::{concat_bounded, Value};

/// range() 生成的列表长度上限
pub const MAX_RANGE_LEN: i64 = 1_000_000;

pub(super) fn module() -> NativeModule {
    NativeModule::new("std")
        .function("type", Arity::Exact(1), |args| Ok(Value::str(args[0].type_name())))
        .function("to_string", Arity::Exact(1), to_string)
        .function("len", Arity::Exact(1), len)
        .function("assert", Arity::Range(1, 2), assert)
        .function("range", Arity::Range(1, 2), range)
}

fn to_string(args: &[Value]) -> Result<Value, String> {
    concat_bounded(&[&args[0]], MAX_TEXT_LEN)
        .map(Value::str)
        .ok_or_else(|| format!("to_string() result is limited to {MAX_TEXT_LEN} bytes"))
}

fn len(args: &[Value]) -> Result<Value, String> {
    let count = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        other => return Err(expected("len", "a string or list", other)),
    };
    Ok(Value::Int(count as i64))
}

fn assert(args: &[Value]) -> Result<Value, String> {
    if args[0].is_truthy() {
        return Ok(Value::Null);
    }
    match args.get(1) {
        Some(message) => Err(format!("assertion failed: {message}")),
        None => Err("assertion failed".to_string()),
    }
}

fn range(args: &[Value]) -> Result<Value, String> {
    let bound = |value: &Value| {
        value
            .as_int()
            .ok_or_else(|| expected("range", "integer bounds", value))
    };
    let (start, end) = match args {
        [end] => (0, bound(end)?),
        [start, end] => (bound(start)?, bound(end)?),
        _ => return Err("range() expects 1 or 2 arguments".to_string()),
    };
    if end.saturating_sub(start) > MAX_RANGE_LEN {
        return Err(format!("range() is limited to {MAX_RANGE_LEN} elements"));
    }
    Ok(Value::list((start..end).map(Value::Int).collect()))
}
