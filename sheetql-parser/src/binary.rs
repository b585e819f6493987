//! Binary operators: arithmetic, comparison, concatenation, and the
//! `contains`/`regex` text predicates.

use regex::RegexBuilder;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Pow,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    Contains,
    ContainsStrict,
    Regex,
    RegexStrict,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Concat => "&",
            Pow => "^",
            Gt => ">",
            Lt => "<",
            Ge => ">=",
            Le => "<=",
            Eq => "=",
            Ne => "<>",
            Contains => "contains",
            ContainsStrict => "contains_strict",
            Regex => "regex",
            RegexStrict => "regex_strict",
        }
    }

    /// All binary operators are deterministic; none observe external state.
    pub fn deterministic(&self) -> bool {
        true
    }

    pub fn apply(&self, lhs: &Value, rhs: &Value) -> Value {
        use BinaryOp::*;
        match self {
            Add => lhs.add(rhs),
            Sub => lhs.sub(rhs),
            Mul => lhs.mul(rhs),
            Div => lhs.div(rhs),
            Mod => lhs.rem(rhs),
            Concat => lhs.concat(rhs),
            Pow => lhs.pow(rhs),
            Gt => Value::Bool(lhs.gt(rhs)),
            Lt => Value::Bool(lhs.lt(rhs)),
            Ge => Value::Bool(lhs.ge(rhs)),
            Le => Value::Bool(lhs.le(rhs)),
            Eq => Value::Bool(lhs.value_eq(rhs)),
            Ne => Value::Bool(!lhs.value_eq(rhs)),
            Contains => contains(lhs, rhs, false),
            ContainsStrict => contains(lhs, rhs, true),
            Regex => regex_match(lhs, rhs, false),
            RegexStrict => regex_match(lhs, rhs, true),
        }
    }
}

fn contains(lhs: &Value, rhs: &Value, strict: bool) -> Value {
    match (lhs.as_string(), rhs.as_string()) {
        (Some(a), Some(b)) => {
            if strict {
                Value::Bool(a.contains(&b))
            } else {
                Value::Bool(a.to_lowercase().contains(&b.to_lowercase()))
            }
        }
        _ => Value::Invalid,
    }
}

fn regex_match(lhs: &Value, rhs: &Value, strict: bool) -> Value {
    match (lhs.as_string(), rhs.as_string()) {
        (Some(a), Some(pattern)) => {
            let built = RegexBuilder::new(&pattern)
                .case_insensitive(!strict)
                .build();
            match built {
                Ok(re) => Value::Bool(re.is_match(&a)),
                Err(_) => Value::Invalid,
            }
        }
        _ => Value::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_propagates_through_arithmetic_ops() {
        assert_eq!(BinaryOp::Add.apply(&Value::Invalid, &Value::Int(1)), Value::Invalid);
    }

    #[test]
    fn ordering_false_with_invalid() {
        assert_eq!(
            BinaryOp::Lt.apply(&Value::Invalid, &Value::Int(1)),
            Value::Bool(false)
        );
    }

    #[test]
    fn contains_is_case_insensitive_strict_is_not() {
        let hay = Value::string("Hello World");
        assert_eq!(
            BinaryOp::Contains.apply(&hay, &Value::string("WORLD")),
            Value::Bool(true)
        );
        assert_eq!(
            BinaryOp::ContainsStrict.apply(&hay, &Value::string("WORLD")),
            Value::Bool(false)
        );
    }

    #[test]
    fn regex_case_sensitivity() {
        let hay = Value::string("Abc123");
        assert_eq!(
            BinaryOp::Regex.apply(&hay, &Value::string("^abc")),
            Value::Bool(true)
        );
        assert_eq!(
            BinaryOp::RegexStrict.apply(&hay, &Value::string("^abc")),
            Value::Bool(false)
        );
    }
}
