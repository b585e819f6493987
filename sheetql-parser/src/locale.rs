//! Locale parameters consumed by the lexer and parser. The core owns no
//! global locale; every call site supplies one explicitly.

use std::collections::HashMap;

use crate::function::Function;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Locale {
    pub decimal_separator: char,
    pub string_qualifier: char,
    /// The full escape sequence that represents one literal qualifier char
    /// inside a string body (e.g. `""` for a doubled double-quote).
    pub string_qualifier_escape: String,
    pub argument_separator: char,
    /// Identifier that resolves to [`crate::expr::Expression::Identity`]
    /// (e.g. `"RC"`).
    pub current_cell_identifier: String,
    /// Bare-identifier constants, e.g. `true`, `false`, `pi`.
    pub constants: HashMap<String, Value>,
    /// Case-insensitive function-name table.
    pub functions: HashMap<String, Function>,
}

impl Locale {
    /// English-language defaults: `.` decimal separator, `"` string
    /// qualifier doubled for escaping, `,` argument separator, `RC` current
    /// cell, and every built-in function under its canonical name.
    pub fn english() -> Self {
        let mut constants = HashMap::new();
        constants.insert("true".to_string(), Value::Bool(true));
        constants.insert("false".to_string(), Value::Bool(false));
        constants.insert("pi".to_string(), Value::double(std::f64::consts::PI));

        let mut functions = HashMap::new();
        for f in ALL_FUNCTIONS {
            functions.insert(f.name().to_ascii_lowercase(), *f);
        }

        Locale {
            decimal_separator: '.',
            string_qualifier: '"',
            string_qualifier_escape: "\"\"".to_string(),
            argument_separator: ',',
            current_cell_identifier: "RC".to_string(),
            constants,
            functions,
        }
    }

    pub fn lookup_constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(&name.to_ascii_lowercase())
    }

    pub fn lookup_function(&self, name: &str) -> Option<Function> {
        self.functions.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn is_current_cell_identifier(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.current_cell_identifier)
    }
}

const ALL_FUNCTIONS: &[Function] = &[
    Function::Upper,
    Function::Lower,
    Function::Left,
    Function::Right,
    Function::Mid,
    Function::Length,
    Function::Substitute,
    Function::RegexSubstitute,
    Function::Trim,
    Function::Concat,
    Function::Negate,
    Function::Absolute,
    Function::Sqrt,
    Function::Log,
    Function::Ln,
    Function::Exp,
    Function::Round,
    Function::Sin,
    Function::Cos,
    Function::Tan,
    Function::Asin,
    Function::Acos,
    Function::Atan,
    Function::Sinh,
    Function::Cosh,
    Function::Tanh,
    Function::And,
    Function::Or,
    Function::Xor,
    Function::Not,
    Function::If,
    Function::IfError,
    Function::Coalesce,
    Function::Sum,
    Function::Count,
    Function::CountAll,
    Function::Average,
    Function::Min,
    Function::Max,
    Function::RandomItem,
    Function::Pack,
    Function::Choose,
    Function::Random,
    Function::RandomBetween,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_locale_resolves_functions_case_insensitively() {
        let locale = Locale::english();
        assert_eq!(locale.lookup_function("UPPER"), Some(Function::Upper));
        assert_eq!(locale.lookup_function("upper"), Some(Function::Upper));
    }

    #[test]
    fn english_locale_has_standard_constants() {
        let locale = Locale::english();
        assert_eq!(locale.lookup_constant("true"), Some(&Value::Bool(true)));
    }
}
