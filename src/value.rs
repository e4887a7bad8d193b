//! Runtime value types for alias scripts

use std::fmt;

use crate::error::{AliasError, ErrorKind, Result};
use crate::token::{Comparator, Operator};
use crate::types::TypeTag;

/// Runtime values.
///
/// Numbers keep their integer-ness in the variant: `Long` values stay in
/// exact 64-bit arithmetic until they meet a `Double` or the `^` operator.
#[derive(Clone)]
pub enum Value {
    /// Integer-discriminated number (int and long variables)
    Long(i64),

    /// Floating number (float and double variables)
    Double(f64),

    /// String value
    Str(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Long(_) => "integer",
            Value::Double(_) => "floating",
            Value::Str(_) => "string",
        }
    }

    /// The zero value a freshly declared variable of `ty` holds
    pub fn default_for(ty: TypeTag) -> Value {
        match ty {
            TypeTag::Int | TypeTag::Long => Value::Long(0),
            TypeTag::Float | TypeTag::Double => Value::Double(0.0),
            TypeTag::String => Value::Str(String::new()),
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    fn as_f64(&self) -> f64 {
        match self {
            Value::Long(n) => *n as f64,
            Value::Double(n) => *n,
            Value::Str(_) => f64::NAN,
        }
    }

    fn invalid(&self, symbol: String, rhs: &Value) -> AliasError {
        AliasError::new(ErrorKind::InvalidOperation {
            symbol,
            left: self.type_name(),
            right: rhs.type_name(),
        })
    }

    /// Apply `op` with `self` as the left operand.
    ///
    /// String concatenation joins in stack-pop order: the right operand's
    /// text comes first, so `"a" + "b"` yields `"ba"`.
    pub fn operation(&self, op: Operator, rhs: &Value) -> Result<Value> {
        if self.is_string() || rhs.is_string() {
            return match op {
                Operator::Add => Ok(Value::Str(format!("{}{}", rhs, self))),
                _ => Err(self.invalid(op.symbol().to_string(), rhs)),
            };
        }

        if op == Operator::Power {
            return Ok(Value::Double(self.as_f64().powf(rhs.as_f64())));
        }

        match (self, rhs) {
            (Value::Long(a), Value::Long(b)) => {
                let (a, b) = (*a, *b);
                let result = match op {
                    Operator::Add => a.wrapping_add(b),
                    Operator::Subtract => a.wrapping_sub(b),
                    Operator::Multiply => a.wrapping_mul(b),
                    Operator::Divide | Operator::Modulo if b == 0 => {
                        return Err(AliasError::new(ErrorKind::DivisionByZero));
                    }
                    Operator::Divide => a.wrapping_div(b),
                    Operator::Modulo => a.wrapping_rem(b),
                    Operator::Power => unreachable!("handled above"),
                };
                Ok(Value::Long(result))
            }
            _ => {
                let (a, b) = (self.as_f64(), rhs.as_f64());
                let result = match op {
                    Operator::Add => a + b,
                    Operator::Subtract => a - b,
                    Operator::Multiply => a * b,
                    Operator::Divide => a / b,
                    Operator::Modulo => a % b,
                    Operator::Power => a.powf(b),
                };
                Ok(Value::Double(result))
            }
        }
    }

    /// Compare `self` (left side) against `rhs` (right side).
    ///
    /// Two integers compare exactly; other numeric pairs compare as `f64`.
    /// Pairs involving a string only support equality of their text forms.
    pub fn compare(&self, cmp: Comparator, rhs: &Value) -> Result<bool> {
        if self.is_string() || rhs.is_string() {
            let equal = self.to_string() == rhs.to_string();
            return match cmp {
                Comparator::Equal => Ok(equal),
                Comparator::NotEqual => Ok(!equal),
                _ => Err(self.invalid(cmp.symbol().to_string(), rhs)),
            };
        }

        let ordering = match (self, rhs) {
            (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&rhs.as_f64()),
        };

        // NaN compares unequal to everything
        let Some(ordering) = ordering else {
            return Ok(cmp == Comparator::NotEqual);
        };

        Ok(match cmp {
            Comparator::Equal => ordering.is_eq(),
            Comparator::NotEqual => ordering.is_ne(),
            Comparator::Less => ordering.is_lt(),
            Comparator::LessEqual => ordering.is_le(),
            Comparator::Greater => ordering.is_gt(),
            Comparator::GreaterEqual => ordering.is_ge(),
        })
    }

    /// Convert into the representation a variable of type `ty` stores
    pub fn coerce(&self, ty: TypeTag) -> Value {
        match ty {
            TypeTag::Int => Value::Long(match self {
                Value::Long(n) => *n as i32 as i64,
                Value::Double(n) => *n as i32 as i64,
                Value::Str(s) => s.trim().parse::<i32>().unwrap_or(0) as i64,
            }),
            TypeTag::Long => Value::Long(match self {
                Value::Long(n) => *n,
                Value::Double(n) => *n as i64,
                Value::Str(s) => s.trim().parse::<i64>().unwrap_or(0),
            }),
            TypeTag::Float => Value::Double(self.coerce_f64() as f32 as f64),
            TypeTag::Double => Value::Double(self.coerce_f64()),
            TypeTag::String => Value::Str(self.to_string()),
        }
    }

    fn coerce_f64(&self) -> f64 {
        match self {
            Value::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            other => other.as_f64(),
        }
    }
}

/// Format a float so it always reads as one: `8.0`, `0.25`, `1e300`
fn format_double(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        write!(f, "{:?}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Long(n) => write!(f, "{}", n),
            Value::Double(n) => format_double(f, *n),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(a: impl Into<Value>, op: Operator, b: impl Into<Value>) -> Value {
        a.into().operation(op, &b.into()).unwrap()
    }

    #[test]
    fn test_integer_arithmetic_stays_exact() {
        assert_eq!(op(7i64, Operator::Divide, 2i64), Value::Long(3));
        assert_eq!(op(7i64, Operator::Modulo, 3i64), Value::Long(1));
        assert_eq!(op(10i64, Operator::Subtract, 3i64), Value::Long(7));
        assert_eq!(
            op(9_007_199_254_740_993i64, Operator::Add, 0i64),
            Value::Long(9_007_199_254_740_993)
        );
    }

    #[test]
    fn test_mixed_arithmetic_promotes() {
        assert_eq!(op(7i64, Operator::Divide, 2.0), Value::Double(3.5));
        assert_eq!(op(1.5, Operator::Multiply, 2i64), Value::Double(3.0));
    }

    #[test]
    fn test_power_is_always_floating() {
        assert_eq!(op(2i64, Operator::Power, 3i64), Value::Double(8.0));
        assert_eq!(op(2i64, Operator::Power, 3i64).to_string(), "8.0");
    }

    #[test]
    fn test_concatenation_uses_pop_order() {
        assert_eq!(op("a", Operator::Add, "b"), Value::from("ba"));
        assert_eq!(op("x", Operator::Add, 5i64), Value::from("5x"));
    }

    #[test]
    fn test_string_rejects_other_operators() {
        let err = Value::from("a")
            .operation(Operator::Subtract, &Value::from("b"))
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::InvalidOperation {
                symbol: "-".to_string(),
                left: "string",
                right: "string",
            }
        );
        assert!(!err.is_compile_error());
        assert_eq!(err.to_string(), "Error: cannot apply '-' to string and string");
    }

    #[test]
    fn test_integer_division_by_zero() {
        let err = Value::Long(1)
            .operation(Operator::Divide, &Value::Long(0))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
        assert_eq!(op(1.0, Operator::Divide, 0i64).to_string(), "Infinity");
    }

    #[test]
    fn test_compare() {
        let three = Value::Long(3);
        assert!(three.compare(Comparator::Less, &Value::Long(4)).unwrap());
        assert!(three.compare(Comparator::Equal, &Value::Double(3.0)).unwrap());
        assert!(three.compare(Comparator::GreaterEqual, &Value::Double(2.5)).unwrap());
        assert!(Value::from("3").compare(Comparator::Equal, &three).unwrap());
        let err = Value::from("a")
            .compare(Comparator::Less, &Value::Long(1))
            .unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::InvalidOperation { left: "string", right: "integer", .. }
        ));
    }

    #[test]
    fn test_coerce() {
        assert_eq!(Value::Double(2.9).coerce(TypeTag::Int), Value::Long(2));
        assert_eq!(Value::Long(1 << 32).coerce(TypeTag::Int), Value::Long(0));
        assert_eq!(Value::Long(5).coerce(TypeTag::Double), Value::Double(5.0));
        assert_eq!(Value::Double(0.1).coerce(TypeTag::Float), Value::Double(0.1f32 as f64));
        assert_eq!(Value::Long(5).coerce(TypeTag::String), Value::from("5"));
        assert_eq!(Value::from("12").coerce(TypeTag::Long), Value::Long(12));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Double(0.25).to_string(), "0.25");
        assert_eq!(Value::Double(-3.0).to_string(), "-3.0");
        assert_eq!(Value::Long(-3).to_string(), "-3");
        assert_eq!(Value::Double(f64::NAN).to_string(), "NaN");
    }
}
