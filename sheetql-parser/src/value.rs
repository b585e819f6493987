//! The tagged scalar that flows through every row of a [`crate::expr::Expression`].
//!
//! `Invalid` is the NaN of this value system: it poisons arithmetic and
//! comparisons rather than panicking. `Empty` is a legitimate absence,
//! distinct from `Invalid`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single cell value.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Empty,
    Invalid,
}

impl Value {
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::String(s.into())
    }

    /// `Double` construction from a non-finite number collapses to `Invalid`.
    pub fn double(d: f64) -> Self {
        if d.is_finite() {
            Value::Double(d)
        } else {
            Value::Invalid
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// True for values that participate in numeric aggregates (`Count`, `Sum`).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Double(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Double(d) => Some(*d != 0.0),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Value::Empty => Some(false),
            Value::Invalid => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Empty => Some(0.0),
            Value::Invalid => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Double(d) => Some(*d as i64),
            Value::Bool(b) => Some(if *b { 1 } else { 0 }),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().map(|d| d as i64)),
            Value::Empty => Some(0),
            Value::Invalid => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Double(d) => Some(format_double(*d)),
            Value::Bool(b) => Some(b.to_string()),
            Value::Empty => Some(String::new()),
            Value::Invalid => None,
        }
    }

    /// Canonical string form used for hashing and fallback equality.
    fn canonical_string(&self) -> String {
        self.as_string().unwrap_or_else(|| "#INVALID".to_string())
    }

    fn arith<F>(&self, other: &Value, f: F) -> Value
    where
        F: FnOnce(f64, f64) -> f64,
    {
        match (self.as_double(), other.as_double()) {
            (Some(a), Some(b)) => Value::double(f(a, b)),
            _ => Value::Invalid,
        }
    }

    pub fn add(&self, other: &Value) -> Value {
        self.arith(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Value) -> Value {
        self.arith(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Value) -> Value {
        self.arith(other, |a, b| a * b)
    }

    pub fn div(&self, other: &Value) -> Value {
        match (self.as_double(), other.as_double()) {
            (Some(_), Some(b)) if b == 0.0 => Value::Invalid,
            (Some(a), Some(b)) => Value::double(a / b),
            _ => Value::Invalid,
        }
    }

    pub fn rem(&self, other: &Value) -> Value {
        match (self.as_double(), other.as_double()) {
            (Some(_), Some(b)) if b == 0.0 => Value::Invalid,
            (Some(a), Some(b)) => Value::double(a % b),
            _ => Value::Invalid,
        }
    }

    pub fn pow(&self, other: &Value) -> Value {
        self.arith(other, |a, b| a.powf(b))
    }

    /// `&`: string concatenation. Either side `Invalid` poisons the result.
    pub fn concat(&self, other: &Value) -> Value {
        if self.is_invalid() || other.is_invalid() {
            return Value::Invalid;
        }
        match (self.as_string(), other.as_string()) {
            (Some(a), Some(b)) => Value::String(a + &b),
            _ => Value::Invalid,
        }
    }

    /// Numeric-first, string-fallback equality. `Invalid == Invalid` is false.
    pub fn value_eq(&self, other: &Value) -> bool {
        if self.is_invalid() || other.is_invalid() {
            return false;
        }
        match (self.as_double(), other.as_double()) {
            (Some(a), Some(b)) => a == b,
            _ => self.canonical_string() == other.canonical_string(),
        }
    }

    /// Ordering comparisons: `Invalid` on either side makes every comparison false.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if self.is_invalid() || other.is_invalid() {
            return None;
        }
        match (self.as_double(), other.as_double()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(self.canonical_string().cmp(&other.canonical_string())),
        }
    }

    pub fn lt(&self, other: &Value) -> bool {
        matches!(self.compare(other), Some(Ordering::Less))
    }
    pub fn le(&self, other: &Value) -> bool {
        matches!(self.compare(other), Some(Ordering::Less | Ordering::Equal))
    }
    pub fn gt(&self, other: &Value) -> bool {
        matches!(self.compare(other), Some(Ordering::Greater))
    }
    pub fn ge(&self, other: &Value) -> bool {
        matches!(
            self.compare(other),
            Some(Ordering::Greater | Ordering::Equal)
        )
    }
}

fn format_double(d: f64) -> String {
    if d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{}", d as i64)
    } else {
        d.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.value_eq(other)
    }
}

// Hashing equals hash of the canonical string form, matching value_eq's
// numeric/string coercion so values that compare equal hash equal too.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_string().hash(state);
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Invalid => write!(f, "#INVALID"),
            _ => write!(f, "{}", self.as_string().unwrap_or_default()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::double(d)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_poisons_arithmetic() {
        assert_eq!(Value::Int(1).add(&Value::Invalid), Value::Invalid);
        assert_eq!(Value::Invalid.mul(&Value::Int(2)), Value::Invalid);
    }

    #[test]
    fn invalid_never_equals_itself() {
        assert!(!(Value::Invalid == Value::Invalid));
    }

    #[test]
    fn division_by_zero_is_invalid() {
        assert_eq!(Value::Int(4).div(&Value::Int(0)), Value::Invalid);
    }

    #[test]
    fn non_finite_double_is_invalid() {
        assert_eq!(Value::double(f64::NAN), Value::Invalid);
        assert_eq!(Value::double(f64::INFINITY), Value::Invalid);
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert_eq!(Value::Int(2), Value::Double(2.0));
        assert_eq!(Value::String("2".into()), Value::Int(2));
    }

    #[test]
    fn ordering_with_invalid_is_false() {
        assert!(!Value::Int(1).lt(&Value::Invalid));
        assert!(!Value::Invalid.gt(&Value::Int(1)));
    }

    #[test]
    fn concat_coerces_to_string() {
        assert_eq!(
            Value::Int(1).concat(&Value::string("x")),
            Value::string("1x")
        );
        assert_eq!(Value::Invalid.concat(&Value::string("x")), Value::Invalid);
    }
}
