//! Deep structural equality, implemented from scratch rather than relying
//! on a derived equality so the null-handling and type-mismatch rules
//! required by the merge executor's conflict detector (spec §4.4, §8) are
//! explicit and testable in isolation.
//!
//! Two nulls are equal (this makes the relation reflexive, which §8 requires
//! of the conflict detector); a null compared against any non-null value is
//! never equal; values of different variants are never equal even when
//! their stringified forms coincide.

use crate::value::Value;

/// Deep-equality comparison. Reflexive, symmetric, and transitive by
/// construction: every branch either delegates to `==` on a concrete
/// primitive type or recurses structurally, so there is no case where
/// `a == b && b == c` can hold while `a == c` does not.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Date(x), Value::Date(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| deep_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| deep_equal(v, other)))
        }
        _ => false,
    }
}
