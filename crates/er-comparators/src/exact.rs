//! Exact-equality comparator (spec §4.1).

use er_core::Value;

/// Options controlling the `exact` comparator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExactOptions {
    /// Whether string comparison is case-sensitive.
    pub case_sensitive: bool,
    /// Whether two nulls/missing values are considered a match.
    pub null_matches_null: bool,
}

impl Default for ExactOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            null_matches_null: true,
        }
    }
}

/// `1.0` when `left` and `right` are equal primitives or equal-by-value
/// dates, `0.0` otherwise. Both null -> `1.0` iff `null_matches_null`; one
/// null -> `0.0`; mismatched types -> `0.0`.
pub fn exact(left: &Value, right: &Value, options: &ExactOptions) -> f64 {
    match (left, right) {
        (Value::Null, Value::Null) => {
            if options.null_matches_null {
                1.0
            } else {
                0.0
            }
        }
        (Value::Null, _) | (_, Value::Null) => 0.0,
        (Value::String(a), Value::String(b)) => {
            let matched = if options.case_sensitive {
                a == b
            } else {
                a.to_lowercase() == b.to_lowercase()
            };
            if matched {
                1.0
            } else {
                0.0
            }
        }
        (Value::Number(a), Value::Number(b)) => {
            if a == b {
                1.0
            } else {
                0.0
            }
        }
        (Value::Bool(a), Value::Bool(b)) => {
            if a == b {
                1.0
            } else {
                0.0
            }
        }
        (Value::Date(a), Value::Date(b)) => {
            if a == b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_case_sensitive() {
        let opts = ExactOptions::default();
        assert_eq!(
            exact(&Value::String("Ada".into()), &Value::String("Ada".into()), &opts),
            1.0
        );
        assert_eq!(
            exact(&Value::String("Ada".into()), &Value::String("ada".into()), &opts),
            0.0
        );
    }

    #[test]
    fn case_insensitive_option() {
        let opts = ExactOptions {
            case_sensitive: false,
            ..ExactOptions::default()
        };
        assert_eq!(
            exact(&Value::String("Ada".into()), &Value::String("ada".into()), &opts),
            1.0
        );
    }

    #[test]
    fn both_null_respects_option() {
        let matches = ExactOptions::default();
        assert_eq!(exact(&Value::Null, &Value::Null, &matches), 1.0);

        let no_match = ExactOptions {
            null_matches_null: false,
            ..ExactOptions::default()
        };
        assert_eq!(exact(&Value::Null, &Value::Null, &no_match), 0.0);
    }

    #[test]
    fn one_null_never_matches() {
        let opts = ExactOptions::default();
        assert_eq!(exact(&Value::Null, &Value::Number(1.0), &opts), 0.0);
    }

    #[test]
    fn type_mismatch_is_zero() {
        let opts = ExactOptions::default();
        assert_eq!(
            exact(&Value::String("1".into()), &Value::Number(1.0), &opts),
            0.0
        );
    }
}
