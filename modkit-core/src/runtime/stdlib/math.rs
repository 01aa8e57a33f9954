use super::{expected, Arity, NativeModule};
use crate::runtime::value::Value;

pub(super) fn module() -> NativeModule {
    NativeModule::new("math")
        .function("sqrt", Arity::Exact(1), |args| {
            let x = number("sqrt", &args[0])?;
            if x < 0.0 {
                return Err("sqrt() of a negative number".to_string());
            }
            Ok(Value::Float(x.sqrt()))
        })
        .function("floor", Arity::Exact(1), |args| round("floor", &args[0], f64::floor))
        .function("ceil", Arity::Exact(1), |args| round("ceil", &args[0], f64::ceil))
        .function("abs", Arity::Exact(1), |args| match &args[0] {
            Value::Int(n) => n
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| "integer overflow in abs()".to_string()),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(expected("abs", "a number", other)),
        })
        .function("min", Arity::AtLeast(1), |args| extreme("min", args, |a, b| a < b))
        .function("max", Arity::AtLeast(1), |args| extreme("max", args, |a, b| a > b))
        .function("pow", Arity::Exact(2), pow)
        .constant("PI", std::f64::consts::PI)
        .constant("E", std::f64::consts::E)
}

fn number(function: &str, value: &Value) -> Result<f64, String> {
    value.as_float().ok_or_else(|| expected(function, "a number", value))
}

/// 取整后能放进 i64 时返回整数
fn round(function: &str, value: &Value, op: fn(f64) -> f64) -> Result<Value, String> {
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) => {
            let rounded = op(*f);
            if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
                Ok(Value::Int(rounded as i64))
            } else {
                Ok(Value::Float(rounded))
            }
        }
        other => Err(expected(function, "a number", other)),
    }
}

fn extreme(function: &str, args: &[Value], better: fn(f64, f64) -> bool) -> Result<Value, String> {
    let mut best = &args[0];
    let mut best_value = number(function, best)?;
    for candidate in &args[1..] {
        let value = number(function, candidate)?;
        if better(value, best_value) {
            best = candidate;
            best_value = value;
        }
    }
    Ok(best.clone())
}

fn pow(args: &[Value]) -> Result<Value, String> {
    match (&args[0], &args[1]) {
        (Value::Int(base), Value::Int(exp)) if *exp >= 0 => {
            let exp = u32::try_from(*exp).map_err(|_| "integer overflow in pow()".to_string())?;
            base.checked_pow(exp)
                .map(Value::Int)
                .ok_or_else(|| "integer overflow in pow()".to_string())
        }
        (base, exp) => Ok(Value::Float(number("pow", base)?.powf(number("pow", exp)?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, String> {
        match module().get(name) {
            Some(Value::Native(f)) => f.call(args),
            _ => panic!("missing {name}"),
        }
    }

    #[test]
    fn test_rounding_returns_int() {
        assert_eq!(call("floor", &[Value::Float(2.7)]), Ok(Value::Int(2)));
        assert_eq!(call("ceil", &[Value::Float(2.1)]), Ok(Value::Int(3)));
        assert_eq!(call("floor", &[Value::Int(-4)]), Ok(Value::Int(-4)));
    }

    #[test]
    fn test_min_max_keep_type() {
        let args = [Value::Int(3), Value::Float(1.5), Value::Int(7)];
        assert!(matches!(call("min", &args), Ok(Value::Float(f)) if f == 1.5));
        assert!(matches!(call("max", &args), Ok(Value::Int(7))));
    }

    #[test]
    fn test_pow() {
        assert_eq!(call("pow", &[Value::Int(2), Value::Int(10)]), Ok(Value::Int(1024)));
        assert_eq!(call("pow", &[Value::Int(4), Value::Float(0.5)]), Ok(Value::Float(2.0)));
        assert!(call("pow", &[Value::Int(10), Value::Int(100)]).is_err());
    }

    #[test]
    fn test_sqrt_domain() {
        assert_eq!(call("sqrt", &[Value::Int(9)]), Ok(Value::Float(3.0)));
        assert!(call("sqrt", &[Value::Int(-1)]).is_err());
        assert!(call("sqrt", &[Value::str("x")]).is_err());
    }
}
