use super::{expected, Arity, NativeModule};
use crate::runtime::value::Value;

/// 原生函数生成字符串的硬上限（字节）；执行限制中更小的上限由 VM 检查
pub const MAX_TEXT_LEN: usize = 16 << 20;

pub(super) fn module() -> NativeModule {
    NativeModule::new("text")
        .function("upper", Arity::Exact(1), |args| {
            Ok(Value::str(string("upper", &args[0])?.to_uppercase()))
        })
        .function("lower", Arity::Exact(1), |args| {
            Ok(Value::str(string("lower", &args[0])?.to_lowercase()))
        })
        .function("trim", Arity::Exact(1), |args| Ok(Value::str(string("trim", &args[0])?.trim())))
        .function("contains", Arity::Exact(2), |args| {
            let (s, pattern) = pair("contains", args)?;
            Ok(Value::Bool(s.contains(pattern)))
        })
        .function("starts_with", Arity::Exact(2), |args| {
            let (s, prefix) = pair("starts_with", args)?;
            Ok(Value::Bool(s.starts_with(prefix)))
        })
        .function("ends_with", Arity::Exact(2), |args| {
            let (s, suffix) = pair("ends_with", args)?;
            Ok(Value::Bool(s.ends_with(suffix)))
        })
        .function("replace", Arity::Exact(3), replace)
}

/// 先估算结果长度，超过 [`MAX_TEXT_LEN`] 时不做替换
fn replace(args: &[Value]) -> Result<Value, String> {
    let (s, from) = pair("replace", args)?;
    let to = string("replace", &args[2])?;
    // 空模式会在每个字符边界插入
    let hits = if from.is_empty() {
        s.chars().count() + 1
    } else {
        s.matches(from).count()
    };
    let len = hits
        .checked_mul(to.len())
        .and_then(|inserted| (s.len() - hits * from.len()).checked_add(inserted));
    match len {
        Some(len) if len <= MAX_TEXT_LEN => Ok(Value::str(s.replace(from, to))),
        _ => Err(format!("replace() result is limited to {MAX_TEXT_LEN} bytes")),
    }
}

fn string<'a>(function: &str, value: &'a Value) -> Result<&'a str, String> {
    value.as_str().ok_or_else(|| expected(function, "a string", value))
}

fn pair<'a>(function: &str, args: &'a [Value]) -> Result<(&'a str, &'a str), String> {
    Ok((string(function, &args[0])?, string(function, &args[1])?))
}
