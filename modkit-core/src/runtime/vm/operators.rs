//! 运算符实现

use super::error::RuntimeErrorKind;
use crate::runtime::value::{concat_bounded, Value};
use std::cmp::Ordering;
use std::sync::Arc;

type OpResult = Result<Value, RuntimeErrorKind>;

fn type_error(verb: &str, a: &Value, b: &Value) -> RuntimeErrorKind {
    RuntimeErrorKind::TypeError(format!(
        "cannot {verb} {} and {}",
        a.type_name(),
        b.type_name()
    ))
}

/// 任一侧为字符串时拼接；列表相加得到新列表
///
/// 拼接结果超过 `max_len`（字符串按字节，列表按元素个数）时在分配前失败。
pub fn add(a: &Value, b: &Value, max_len: usize) -> OpResult {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_add(*y)
            .map(Value::Int)
            .ok_or(RuntimeErrorKind::Overflow("+")),
        (Value::Str(_), _) | (_, Value::Str(_)) => concat_bounded(&[a, b], max_len)
            .map(Value::str)
            .ok_or(RuntimeErrorKind::ValueTooLarge(max_len)),
        (Value::List(x), Value::List(y)) => {
            if x.len() + y.len() > max_len {
                return Err(RuntimeErrorKind::ValueTooLarge(max_len));
            }
            let mut items = Vec::with_capacity(x.len() + y.len());
            items.extend(x.iter().cloned());
            items.extend(y.iter().cloned());
            Ok(Value::List(Arc::new(items)))
        }
        _ => float_op(a, b, |x, y| x + y).ok_or_else(|| type_error("add", a, b)),
    }
}

pub fn sub(a: &Value, b: &Value) -> OpResult {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_sub(*y)
            .map(Value::Int)
            .ok_or(RuntimeErrorKind::Overflow("-")),
        _ => float_op(a, b, |x, y| x - y).ok_or_else(|| type_error("subtract", a, b)),
    }
}

pub fn mul(a: &Value, b: &Value) -> OpResult {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_mul(*y)
            .map(Value::Int)
            .ok_or(RuntimeErrorKind::Overflow("*")),
        _ => float_op(a, b, |x, y| x * y).ok_or_else(|| type_error("multiply", a, b)),
    }
}

/// 整数除法向零截断
pub fn div(a: &Value, b: &Value) -> OpResult {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeErrorKind::DivisionByZero),
        (Value::Int(x), Value::Int(y)) => x
            .checked_div(*y)
            .map(Value::Int)
            .ok_or(RuntimeErrorKind::Overflow("/")),
        _ => {
            let (x, y) = numbers(a, b).ok_or_else(|| type_error("divide", a, b))?;
            if y == 0.0 {
                return Err(RuntimeErrorKind::DivisionByZero);
            }
            Ok(Value::Float(x / y))
        }
    }
}

pub fn rem(a: &Value, b: &Value) -> OpResult {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeErrorKind::DivisionByZero),
        (Value::Int(x), Value::Int(y)) => x
            .checked_rem(*y)
            .map(Value::Int)
            .ok_or(RuntimeErrorKind::Overflow("%")),
        _ => {
            let (x, y) = numbers(a, b).ok_or_else(|| type_error("take remainder of", a, b))?;
            if y == 0.0 {
                return Err(RuntimeErrorKind::DivisionByZero);
            }
            Ok(Value::Float(x % y))
        }
    }
}

pub fn neg(value: &Value) -> OpResult {
    match value {
        Value::Int(n) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or(RuntimeErrorKind::Overflow("-")),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(RuntimeErrorKind::TypeError(format!(
            "cannot negate {}",
            other.type_name()
        ))),
    }
}

/// 数值之间、字符串之间可比较
pub fn compare(a: &Value, b: &Value) -> Result<Ordering, RuntimeErrorKind> {
    let ordering = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => numbers(a, b).and_then(|(x, y)| x.partial_cmp(&y)),
    };
    ordering.ok_or_else(|| type_error("compare", a, b))
}

fn numbers(a: &Value, b: &Value) -> Option<(f64, f64)> {
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            Some((a.as_float()?, b.as_float()?))
        }
        _ => None,
    }
}

fn float_op(a: &Value, b: &Value, op: impl Fn(f64, f64) -> f64) -> Option<Value> {
    numbers(a, b).map(|(x, y)| Value::Float(op(x, y)))
}

/// 下标读取：列表与字符串（按字符）
pub fn index_get(object: &Value, index: &Value) -> OpResult {
    let i = index_of(index)?;
    match object {
        Value::List(items) => checked_index(i, items.len()).map(|at| items[at].clone()),
        Value::Str(text) => {
            let len = text.chars().count();
            let at = checked_index(i, len)?;
            Ok(text
                .chars()
                .nth(at)
                .map(|ch| Value::str(ch.to_string()))
                .unwrap_or_default())
        }
        other => Err(RuntimeErrorKind::TypeError(format!(
            "cannot index {}",
            other.type_name()
        ))),
    }
}

/// 下标写入：返回替换后的新列表，原列表不变
pub fn index_set(object: &Value, index: &Value, value: Value) -> OpResult {
    let i = index_of(index)?;
    match object {
        Value::List(items) => {
            let at = checked_index(i, items.len())?;
            let mut items = Arc::clone(items);
            Arc::make_mut(&mut items)[at] = value;
            Ok(Value::List(items))
        }
        other => Err(RuntimeErrorKind::TypeError(format!(
            "cannot assign into {}",
            other.type_name()
        ))),
    }
}

fn index_of(index: &Value) -> Result<i64, RuntimeErrorKind> {
    match index {
        Value::Int(i) => Ok(*i),
        other => Err(RuntimeErrorKind::TypeError(format!(
            "index must be int, found {}",
            other.type_name()
        ))),
    }
}

fn checked_index(index: i64, len: usize) -> Result<usize, RuntimeErrorKind> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(RuntimeErrorKind::IndexOutOfBounds { index, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1 << 20;

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(add(&Value::Int(2), &Value::Int(3), LIMIT), Ok(Value::Int(5)));
        assert_eq!(div(&Value::Int(7), &Value::Int(2)), Ok(Value::Int(3)));
        assert_eq!(div(&Value::Int(-7), &Value::Int(2)), Ok(Value::Int(-3)));
        assert_eq!(rem(&Value::Int(-7), &Value::Int(2)), Ok(Value::Int(-1)));
    }

    #[test]
    fn test_overflow_and_zero() {
        assert_eq!(
            add(&Value::Int(i64::MAX), &Value::Int(1), LIMIT),
            Err(RuntimeErrorKind::Overflow("+"))
        );
        assert_eq!(
            div(&Value::Int(i64::MIN), &Value::Int(-1)),
            Err(RuntimeErrorKind::Overflow("/"))
        );
        assert_eq!(
            div(&Value::Int(1), &Value::Int(0)),
            Err(RuntimeErrorKind::DivisionByZero)
        );
        assert_eq!(
            div(&Value::Float(1.0), &Value::Int(0)),
            Err(RuntimeErrorKind::DivisionByZero)
        );
        assert_eq!(neg(&Value::Int(i64::MIN)), Err(RuntimeErrorKind::Overflow("-")));
    }

    #[test]
    fn test_mixed_numbers_and_strings() {
        assert_eq!(add(&Value::Int(1), &Value::Float(0.5), LIMIT), Ok(Value::Float(1.5)));
        assert_eq!(add(&Value::str("n="), &Value::Int(3), LIMIT), Ok(Value::str("n=3")));
        assert_eq!(add(&Value::Int(3), &Value::str("!"), LIMIT), Ok(Value::str("3!")));
        assert!(matches!(
            sub(&Value::str("a"), &Value::Int(1)),
            Err(RuntimeErrorKind::TypeError(_))
        ));
    }

    #[test]
    fn test_concatenation_respects_size_limit() {
        assert_eq!(add(&Value::str("abc"), &Value::str("de"), 5), Ok(Value::str("abcde")));
        assert_eq!(
            add(&Value::str("abc"), &Value::Int(123), 5),
            Err(RuntimeErrorKind::ValueTooLarge(5))
        );
        let pair = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(add(&pair, &pair, 4).map(|v| v.size()), Ok(4));
        assert_eq!(add(&pair, &pair, 3), Err(RuntimeErrorKind::ValueTooLarge(3)));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&Value::Int(1), &Value::Float(1.5)), Ok(Ordering::Less));
        assert_eq!(compare(&Value::str("b"), &Value::str("a")), Ok(Ordering::Greater));
        assert!(compare(&Value::Null, &Value::Int(1)).is_err());
    }

    #[test]
    fn test_index_copy_on_write() {
        let original = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let updated = index_set(&original, &Value::Int(0), Value::Int(9)).unwrap();
        assert_eq!(original.to_string(), "[1, 2]");
        assert_eq!(updated.to_string(), "[9, 2]");
        assert_eq!(
            index_get(&updated, &Value::Int(2)),
            Err(RuntimeErrorKind::IndexOutOfBounds { index: 2, len: 2 })
        );
        assert_eq!(index_get(&Value::str("héllo"), &Value::Int(1)), Ok(Value::str("é")));
    }
}
