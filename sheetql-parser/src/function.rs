//! Named unary/n-ary functions. A closed enumeration; arity violations and
//! type mismatches never fail, they evaluate to [`Value::Invalid`].

use rand::Rng;
use regex::RegexBuilder;

use crate::pack;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Between(usize, usize),
    Any,
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Fixed(k) => n == k,
            Arity::Between(lo, hi) => n >= lo && n <= hi,
            Arity::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Upper,
    Lower,
    Left,
    Right,
    Mid,
    Length,
    Substitute,
    RegexSubstitute,
    Trim,
    Concat,
    Negate,
    Absolute,
    Sqrt,
    Log,
    Ln,
    Exp,
    Round,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    And,
    Or,
    Xor,
    Not,
    If,
    IfError,
    Coalesce,
    Sum,
    Count,
    CountAll,
    Average,
    Min,
    Max,
    RandomItem,
    Pack,
    Choose,
    Random,
    RandomBetween,
}

impl Function {
    pub fn name(&self) -> &'static str {
        use Function::*;
        match self {
            Upper => "Upper",
            Lower => "Lower",
            Left => "Left",
            Right => "Right",
            Mid => "Mid",
            Length => "Length",
            Substitute => "Substitute",
            RegexSubstitute => "RegexSubstitute",
            Trim => "Trim",
            Concat => "Concat",
            Negate => "Negate",
            Absolute => "Absolute",
            Sqrt => "Sqrt",
            Log => "Log",
            Ln => "Ln",
            Exp => "Exp",
            Round => "Round",
            Sin => "Sin",
            Cos => "Cos",
            Tan => "Tan",
            Asin => "Asin",
            Acos => "Acos",
            Atan => "Atan",
            Sinh => "Sinh",
            Cosh => "Cosh",
            Tanh => "Tanh",
            And => "And",
            Or => "Or",
            Xor => "Xor",
            Not => "Not",
            If => "If",
            IfError => "IfError",
            Coalesce => "Coalesce",
            Sum => "Sum",
            Count => "Count",
            CountAll => "CountAll",
            Average => "Average",
            Min => "Min",
            Max => "Max",
            RandomItem => "RandomItem",
            Pack => "Pack",
            Choose => "Choose",
            Random => "Random",
            RandomBetween => "RandomBetween",
        }
    }

    pub fn arity(&self) -> Arity {
        use Function::*;
        match self {
            Upper | Lower | Length | Trim | Negate | Absolute | Sqrt | Ln | Exp | Sin | Cos
            | Tan | Asin | Acos | Atan | Sinh | Cosh | Tanh | Not => Arity::Fixed(1),
            Left | Right | Xor | IfError | RandomBetween => Arity::Fixed(2),
            Mid | Substitute | RegexSubstitute | If => Arity::Fixed(3),
            Choose => Arity::Between(2, usize::MAX),
            Round | Log => Arity::Between(1, 2),
            Concat | And | Or | Coalesce | Sum | Count | CountAll | Average | Min | Max
            | RandomItem | Pack => Arity::Any,
            Random => Arity::Fixed(0),
        }
    }

    /// `Random`, `RandomBetween`, `RandomItem` observe an external RNG and
    /// are therefore excluded from constant folding and SQL-expression
    /// lowering by [`Self::deterministic`].
    pub fn deterministic(&self) -> bool {
        !matches!(
            self,
            Function::Random | Function::RandomBetween | Function::RandomItem
        )
    }

    pub fn apply(&self, args: &[Value]) -> Value {
        if !self.arity().accepts(args.len()) {
            return Value::Invalid;
        }
        use Function::*;
        match self {
            Upper => str1(args, |s| s.to_uppercase()),
            Lower => str1(args, |s| s.to_lowercase()),
            Left => left(args),
            Right => right(args),
            Mid => mid(args),
            Length => match args[0].as_string() {
                Some(s) => Value::Int(s.chars().count() as i64),
                None => Value::Invalid,
            },
            Substitute => substitute(args),
            RegexSubstitute => regex_substitute(args),
            Trim => str1(args, |s| {
                s.trim_matches(|c: char| c.is_whitespace()).to_string()
            }),
            Concat => concat_all(args),
            Negate => num1(args, |d| -d),
            Absolute => num1(args, |d| d.abs()),
            Sqrt => num1(args, |d| d.sqrt()),
            Log => log(args),
            Ln => num1(args, |d| d.ln()),
            Exp => num1(args, |d| d.exp()),
            Round => round(args),
            Sin => num1(args, |d| d.sin()),
            Cos => num1(args, |d| d.cos()),
            Tan => num1(args, |d| d.tan()),
            Asin => num1(args, |d| d.asin()),
            Acos => num1(args, |d| d.acos()),
            Atan => num1(args, |d| d.atan()),
            Sinh => num1(args, |d| d.sinh()),
            Cosh => num1(args, |d| d.cosh()),
            Tanh => num1(args, |d| d.tanh()),
            And => bool_fold(args, true, |a, b| a && b),
            Or => bool_fold(args, false, |a, b| a || b),
            Xor => match (args[0].as_bool(), args[1].as_bool()) {
                (Some(a), Some(b)) => Value::Bool(a ^ b),
                _ => Value::Invalid,
            },
            Not => match args[0].as_bool() {
                Some(b) => Value::Bool(!b),
                None => Value::Invalid,
            },
            If => match args[0].as_bool() {
                Some(true) => args[1].clone(),
                Some(false) => args[2].clone(),
                None => Value::Invalid,
            },
            IfError => {
                if args[0].is_invalid() {
                    args[1].clone()
                } else {
                    args[0].clone()
                }
            }
            Coalesce => args
                .iter()
                .find(|v| !v.is_empty() && !v.is_invalid())
                .cloned()
                .unwrap_or(Value::Empty),
            Sum => Value::double(args.iter().filter_map(|v| v.as_double_if_numeric()).sum()),
            Count => Value::Int(args.iter().filter(|v| v.is_numeric()).count() as i64),
            CountAll => Value::Int(args.len() as i64),
            Average => {
                let numeric: Vec<f64> = args.iter().filter_map(|v| v.as_double_if_numeric()).collect();
                if args.is_empty() {
                    Value::Invalid
                } else {
                    Value::double(numeric.iter().sum::<f64>() / args.len() as f64)
                }
            }
            Min => extremum(args, false),
            Max => extremum(args, true),
            RandomItem => {
                if args.is_empty() {
                    Value::Invalid
                } else {
                    let idx = rand::thread_rng().gen_range(0..args.len());
                    args[idx].clone()
                }
            }
            Pack => {
                let items: Vec<String> = args.iter().map(|v| v.as_string().unwrap_or_default()).collect();
                Value::String(pack::pack(&items, ','))
            }
            Choose => choose(args),
            Random => Value::double(rand::thread_rng().gen_range(0.0..1.0)),
            RandomBetween => random_between(args),
        }
    }
}

impl Value {
    fn as_double_if_numeric(&self) -> Option<f64> {
        if self.is_numeric() {
            self.as_double()
        } else {
            None
        }
    }
}

fn str1(args: &[Value], f: impl FnOnce(String) -> String) -> Value {
    match args[0].as_string() {
        Some(s) => Value::String(f(s)),
        None => Value::Invalid,
    }
}

fn num1(args: &[Value], f: impl FnOnce(f64) -> f64) -> Value {
    match args[0].as_double() {
        Some(d) => Value::double(f(d)),
        None => Value::Invalid,
    }
}

fn left(args: &[Value]) -> Value {
    match (args[0].as_string(), args[1].as_int()) {
        (Some(s), Some(n)) => {
            let n = n.max(0) as usize;
            Value::String(s.chars().take(n).collect())
        }
        _ => Value::Invalid,
    }
}

fn right(args: &[Value]) -> Value {
    match (args[0].as_string(), args[1].as_int()) {
        (Some(s), Some(n)) => {
            let n = n.max(0) as usize;
            let chars: Vec<char> = s.chars().collect();
            let start = chars.len().saturating_sub(n);
            Value::String(chars[start..].iter().collect())
        }
        _ => Value::Invalid,
    }
}

/// 1-based `start`, clamped to the string end.
fn mid(args: &[Value]) -> Value {
    match (args[0].as_string(), args[1].as_int(), args[2].as_int()) {
        (Some(s), Some(start), Some(len)) => {
            let chars: Vec<char> = s.chars().collect();
            let start0 = (start.max(1) as usize - 1).min(chars.len());
            let end = (start0 + len.max(0) as usize).min(chars.len());
            Value::String(chars[start0..end].iter().collect())
        }
        _ => Value::Invalid,
    }
}

fn substitute(args: &[Value]) -> Value {
    match (
        args[0].as_string(),
        args[1].as_string(),
        args[2].as_string(),
    ) {
        (Some(s), Some(find), Some(rep)) => {
            if find.is_empty() {
                Value::String(s)
            } else {
                Value::String(s.replace(&find, &rep))
            }
        }
        _ => Value::Invalid,
    }
}

fn regex_substitute(args: &[Value]) -> Value {
    match (
        args[0].as_string(),
        args[1].as_string(),
        args[2].as_string(),
    ) {
        (Some(s), Some(pattern), Some(rep)) => match RegexBuilder::new(&pattern).build() {
            Ok(re) => Value::String(re.replace_all(&s, rep.as_str()).into_owned()),
            Err(_) => Value::Invalid,
        },
        _ => Value::Invalid,
    }
}

fn concat_all(args: &[Value]) -> Value {
    let mut out = String::new();
    for a in args {
        if a.is_invalid() {
            return Value::Invalid;
        }
        out.push_str(&a.as_string().unwrap_or_default());
    }
    Value::String(out)
}

fn log(args: &[Value]) -> Value {
    let x = match args[0].as_double() {
        Some(x) => x,
        None => return Value::Invalid,
    };
    if args.len() == 1 {
        return Value::double(x.log10());
    }
    match args[1].as_double() {
        Some(base) => Value::double(x.log(base)),
        None => Value::Invalid,
    }
}

fn round(args: &[Value]) -> Value {
    let x = match args[0].as_double() {
        Some(x) => x,
        None => return Value::Invalid,
    };
    let digits = if args.len() == 2 {
        match args[1].as_int() {
            Some(d) => d,
            None => return Value::Invalid,
        }
    } else {
        0
    };
    let factor = 10f64.powi(digits as i32);
    Value::double((x * factor).round() / factor)
}

fn bool_fold(args: &[Value], init: bool, f: impl Fn(bool, bool) -> bool) -> Value {
    let mut acc = init;
    for a in args {
        match a.as_bool() {
            Some(b) => acc = f(acc, b),
            None => return Value::Invalid,
        }
    }
    Value::Bool(acc)
}

fn extremum(args: &[Value], want_max: bool) -> Value {
    let mut best: Option<&Value> = None;
    for a in args {
        if a.is_invalid() {
            continue;
        }
        best = match best {
            None => Some(a),
            Some(b) => {
                let take = if want_max { a.gt(b) } else { a.lt(b) };
                if take {
                    Some(a)
                } else {
                    Some(b)
                }
            }
        };
    }
    best.cloned().unwrap_or(Value::Invalid)
}

fn choose(args: &[Value]) -> Value {
    match args[0].as_int() {
        Some(idx) if idx >= 0 && (idx as usize) + 1 < args.len() => {
            args[idx as usize + 1].clone()
        }
        Some(_) => Value::Invalid,
        None => Value::Invalid,
    }
}

fn random_between(args: &[Value]) -> Value {
    match (args[0].as_int(), args[1].as_int()) {
        (Some(lo), Some(hi)) if lo <= hi => {
            Value::Int(rand::thread_rng().gen_range(lo..=hi))
        }
        _ => Value::Invalid,
    }
}
