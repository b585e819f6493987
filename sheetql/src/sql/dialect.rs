//! SQL lowering: a `Dialect` turns `Value`/`Expression`/`Function` nodes
//! into SQL text, or returns `None` when it has no safe translation. A
//! `None` anywhere in a lowering chain propagates outward and tells the
//! caller to fall back to the streaming/raster implementation instead.

use sheetql_parser::{BinaryOp, Column, Expression, Function, Value};

use crate::aggregation::Aggregation;

/// Quoting, identifier, and expression-to-SQL conventions for one target
/// database. Every method has a conservative default; dialects override
/// only where their SQL differs.
pub trait Dialect: Send + Sync {
    fn string_qualifier(&self) -> char {
        '\''
    }

    fn string_escape(&self) -> &str {
        "''"
    }

    fn identifier_qualifier(&self) -> char {
        '"'
    }

    /// SQL literal used for `Value::Empty`; dialects differ on `''` vs `NULL`.
    fn empty_literal(&self) -> &str {
        "''"
    }

    fn random_function(&self) -> &str {
        "RANDOM()"
    }

    fn quote_string(&self, s: &str) -> String {
        let q = self.string_qualifier();
        let escaped = s.replace(q, self.string_escape());
        format!("{q}{escaped}{q}")
    }

    fn column_identifier(&self, column: &Column) -> String {
        let q = self.identifier_qualifier();
        format!("{q}{}{q}", column.name())
    }

    fn table_identifier(&self, name: &str) -> String {
        let q = self.identifier_qualifier();
        format!("{q}{name}{q}")
    }

    /// `Invalid` lowers to a guaranteed runtime error (`1/0`) rather than a
    /// sentinel value, so it poisons any expression it appears in exactly
    /// as it does in-memory.
    fn value_to_sql(&self, value: &Value) -> String {
        match value {
            Value::String(s) => self.quote_string(s),
            Value::Int(i) => i.to_string(),
            Value::Double(d) => format!("{d}"),
            Value::Bool(true) => "(1=1)".to_string(),
            Value::Bool(false) => "(1=0)".to_string(),
            Value::Empty => self.empty_literal().to_string(),
            Value::Invalid => "(1/0)".to_string(),
        }
    }

    fn binary_to_sql(&self, op: BinaryOp, lhs: &str, rhs: &str) -> Option<String> {
        use BinaryOp::*;
        Some(match op {
            Add => format!("({lhs} + {rhs})"),
            Sub => format!("({lhs} - {rhs})"),
            Mul => format!("({lhs} * {rhs})"),
            Div => format!("({lhs} / {rhs})"),
            Mod => format!("({lhs} % {rhs})"),
            Concat => format!("({lhs} || {rhs})"),
            Pow => format!("POWER({lhs}, {rhs})"),
            Gt => format!("({lhs} > {rhs})"),
            Lt => format!("({lhs} < {rhs})"),
            Ge => format!("({lhs} >= {rhs})"),
            Le => format!("({lhs} <= {rhs})"),
            Eq => format!("({lhs} = {rhs})"),
            Ne => format!("({lhs} <> {rhs})"),
            Contains => format!("(LOWER({lhs}) LIKE LOWER(CONCAT('%', {rhs}, '%')))"),
            ContainsStrict => format!("({lhs} LIKE CONCAT('%', {rhs}, '%'))"),
            Regex | RegexStrict => return None,
        })
    }

    /// Row-scalar lowering for a `Function` call — the context is a single
    /// expression tree (`calculate`, `filter`), not an aggregate reduce;
    /// see [`Dialect::aggregate_function_sql`] for that.
    fn unary_to_sql(&self, func: Function, args: &[String]) -> Option<String> {
        use Function::*;
        if !func.deterministic() {
            return None;
        }
        let a = |i: usize| args.get(i).cloned();
        Some(match func {
            Upper => format!("UPPER({})", a(0)?),
            Lower => format!("LOWER({})", a(0)?),
            Length => format!("LENGTH({})", a(0)?),
            Trim => format!("TRIM({})", a(0)?),
            Negate => format!("(-{})", a(0)?),
            Absolute => format!("ABS({})", a(0)?),
            Sqrt => format!("SQRT({})", a(0)?),
            Ln => format!("LN({})", a(0)?),
            Exp => format!("EXP({})", a(0)?),
            Sin => format!("SIN({})", a(0)?),
            Cos => format!("COS({})", a(0)?),
            Tan => format!("TAN({})", a(0)?),
            Asin => format!("ASIN({})", a(0)?),
            Acos => format!("ACOS({})", a(0)?),
            Atan => format!("ATAN({})", a(0)?),
            Sinh => format!("SINH({})", a(0)?),
            Cosh => format!("COSH({})", a(0)?),
            Tanh => format!("TANH({})", a(0)?),
            Left => format!("SUBSTR({}, 1, {})", a(0)?, a(1)?),
            Right => format!("SUBSTR({}, -({}))", a(0)?, a(1)?),
            Mid => format!("SUBSTR({}, {}, {})", a(0)?, a(1)?, a(2)?),
            Substitute => format!("REPLACE({}, {}, {})", a(0)?, a(1)?, a(2)?),
            Round if args.len() == 1 => format!("ROUND({})", a(0)?),
            Round => format!("ROUND({}, {})", a(0)?, a(1)?),
            Log if args.len() == 1 => format!("LOG10({})", a(0)?),
            Log => format!("(LN({}) / LN({}))", a(0)?, a(1)?),
            Not => format!("(NOT {})", a(0)?),
            And if !args.is_empty() => format!("({})", args.join(" AND ")),
            Or if !args.is_empty() => format!("({})", args.join(" OR ")),
            If => format!("(CASE WHEN {} THEN {} ELSE {} END)", a(0)?, a(1)?, a(2)?),
            Coalesce if !args.is_empty() => format!("COALESCE({})", args.join(", ")),
            Sum if !args.is_empty() => format!("({})", args.join(" + ")),
            Average if !args.is_empty() => {
                format!("(({}) / {})", args.join(" + "), args.len())
            }
            Min if !args.is_empty() => format!("MIN({})", args.join(", ")),
            Max if !args.is_empty() => format!("MAX({})", args.join(", ")),
            Count if !args.is_empty() => args
                .iter()
                .map(|a| format!("(CASE WHEN TYPEOF({a}) IN ('integer', 'real') THEN 1 ELSE 0 END)"))
                .collect::<Vec<_>>()
                .join(" + "),
            CountAll => args.len().to_string(),
            Concat if !args.is_empty() => format!("({})", args.join(" || ")),
            // No portable/safe lowering: varies by engine (Xor), depends on
            // a driver-side RNG (Random/RandomBetween/RandomItem), or
            // requires regex support the base SQL standard lacks
            // (RegexSubstitute), or picks an argument by runtime index
            // (Choose).
            Xor | IfError | RandomItem | Random | RandomBetween | RegexSubstitute | Choose
            | Pack => return None,
            _ => return None,
        })
    }

    /// Walks an `Expression` tree into one SQL fragment, or `None` the
    /// moment any subtree has no safe translation. `input_sql` is the SQL
    /// for the cell `Expression::Identity` resolves to (the column being
    /// overwritten, in a `calculate`).
    fn expression_to_sql(
        &self,
        expr: &Expression,
        columns: &[Column],
        input_sql: Option<&str>,
    ) -> Option<String> {
        match expr {
            Expression::Literal(v) => Some(self.value_to_sql(v)),
            Expression::Identity => input_sql.map(|s| s.to_string()),
            Expression::Sibling(col) => {
                if columns.iter().any(|c| c == col) {
                    Some(self.column_identifier(col))
                } else {
                    None
                }
            }
            Expression::Binary(op, lhs, rhs) => {
                let l = self.expression_to_sql(lhs, columns, input_sql)?;
                let r = self.expression_to_sql(rhs, columns, input_sql)?;
                self.binary_to_sql(*op, &l, &r)
            }
            Expression::Function(f, args) => {
                let arg_sql: Option<Vec<String>> = args
                    .iter()
                    .map(|a| self.expression_to_sql(a, columns, input_sql))
                    .collect();
                self.unary_to_sql(*f, &arg_sql?)
            }
        }
    }

    /// Lowers `agg.reduce` applied over the already-lowered per-row
    /// expression `inner_sql`; this is the aggregate-context counterpart
    /// of [`Dialect::unary_to_sql`] (e.g. `Count` here means `SUM(CASE
    /// ...)` over a group, not a row-scalar count of fixed arguments).
    fn aggregate_function_sql(&self, func: Function, inner_sql: &str) -> Option<String> {
        use Function::*;
        Some(match func {
            Sum => format!("SUM({inner_sql})"),
            Average => format!("AVG({inner_sql})"),
            Min => format!("MIN({inner_sql})"),
            Max => format!("MAX({inner_sql})"),
            Count => format!(
                "SUM(CASE WHEN TYPEOF({inner_sql}) IN ('integer', 'real') THEN 1 ELSE 0 END)"
            ),
            CountAll => "COUNT(*)".to_string(),
            _ => return None,
        })
    }

    /// `SELECT`-list entry for one aggregation target, or `None` if its
    /// map expression or reduce function has no lowering.
    fn aggregation_to_sql(&self, agg: &Aggregation, columns: &[Column]) -> Option<String> {
        let mapped = self.expression_to_sql(&agg.map.prepare(), columns, None)?;
        let reduced = self.aggregate_function_sql(agg.reduce, &mapped)?;
        Some(format!("{reduced} AS {}", self.column_identifier(&agg.target)))
    }
}

/// An ANSI-ish baseline dialect used when no database-specific quirks
/// apply; every translation rule comes from the trait defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericDialect;

impl Dialect for GenericDialect {}

/// SQLite-flavored dialect: `Empty` lowers to `NULL` rather than `''`, and
/// `Pack` gets a real aggregate lowering via `GROUP_CONCAT` with the same
/// separator/escape scheme as [`sheetql_parser::pack`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn empty_literal(&self) -> &str {
        "NULL"
    }

    fn aggregate_function_sql(&self, func: Function, inner_sql: &str) -> Option<String> {
        if func == Function::Pack {
            let escaped = format!(
                "REPLACE(REPLACE({inner_sql}, '$', '$1'), ',', '$0')"
            );
            return Some(format!("GROUP_CONCAT({escaped}, ',')"));
        }
        // Delegate everything else to the shared baseline.
        GenericDialect.aggregate_function_sql(func, inner_sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetql_parser::Column;

    #[test]
    fn value_to_sql_poisons_invalid_and_quotes_strings() {
        let d = GenericDialect;
        assert_eq!(d.value_to_sql(&Value::Invalid), "(1/0)");
        assert_eq!(d.value_to_sql(&Value::string("a'b")), "'a''b'");
        assert_eq!(d.value_to_sql(&Value::Bool(true)), "(1=1)");
    }

    #[test]
    fn generic_vs_sqlite_empty_literal() {
        assert_eq!(GenericDialect.value_to_sql(&Value::Empty), "''");
        assert_eq!(SqliteDialect.value_to_sql(&Value::Empty), "NULL");
    }

    #[test]
    fn regex_has_no_lowering() {
        let d = GenericDialect;
        assert_eq!(d.binary_to_sql(BinaryOp::Regex, "a", "b"), None);
    }

    #[test]
    fn expression_to_sql_walks_sibling_and_binary() {
        let d = GenericDialect;
        let columns = vec![Column::new("A")];
        let expr = Expression::binary(
            BinaryOp::Mul,
            Expression::sibling("A"),
            Expression::literal(2i64),
        );
        assert_eq!(
            d.expression_to_sql(&expr, &columns, None),
            Some("(\"A\" * 2)".to_string())
        );
    }

    #[test]
    fn unknown_sibling_yields_no_lowering() {
        let d = GenericDialect;
        let expr = Expression::sibling("Z");
        assert_eq!(d.expression_to_sql(&expr, &[], None), None);
    }

    #[test]
    fn regex_substitute_and_choose_are_unlowerable() {
        let d = GenericDialect;
        assert_eq!(d.unary_to_sql(Function::RegexSubstitute, &["a".into(), "b".into(), "c".into()]), None);
        assert_eq!(d.unary_to_sql(Function::Choose, &["a".into(), "b".into()]), None);
    }

    #[test]
    fn sqlite_pack_aggregate_uses_group_concat() {
        let d = SqliteDialect;
        let sql = d.aggregate_function_sql(Function::Pack, "\"A\"").unwrap();
        assert!(sql.starts_with("GROUP_CONCAT("));
        assert!(sql.contains("REPLACE"));
    }
}
