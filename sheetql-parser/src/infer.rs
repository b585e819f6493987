//! Expression inference: given an optional `from` expression and a target
//! value, enumerate expressions that evaluate to the target. Used by the
//! "fill from example" interaction, where a user types a `to` value for one
//! row and the engine proposes a formula.

use std::collections::HashSet;

use crate::binary::BinaryOp;
use crate::column::Column;
use crate::expr::Expression;
use crate::function::Function;
use crate::value::Value;

/// Direct (one-step) candidates derived from `from` (or, if `from` is
/// `None`, anchors into the row: siblings and the literal target itself).
fn suggest(from: Option<&Expression>, to: &Value, row: &[Value], columns: &[Column]) -> Vec<Expression> {
    let mut out = Vec::new();

    let Some(from) = from else {
        for col in columns {
            out.push(Expression::sibling(col.clone()));
        }
        out.push(Expression::literal(to.clone()));
        return out;
    };

    let from_value = from.apply(row, columns, None);

    // Binary: close a numeric gap with +, -, *, or /.
    if let (Some(fv), Some(tv)) = (from_value.as_double(), to.as_double()) {
        out.push(Expression::binary(
            BinaryOp::Add,
            from.clone(),
            Expression::literal(tv - fv),
        ));
        out.push(Expression::binary(
            BinaryOp::Sub,
            from.clone(),
            Expression::literal(fv - tv),
        ));
        if fv != 0.0 {
            out.push(Expression::binary(
                BinaryOp::Mul,
                from.clone(),
                Expression::literal(tv / fv),
            ));
        }
        if tv != 0.0 && fv / tv != 0.0 {
            out.push(Expression::binary(
                BinaryOp::Div,
                from.clone(),
                Expression::literal(fv / tv),
            ));
        }
    }

    // Function: try every deterministic unary function for a direct match.
    for f in UNARY_FUNCTIONS {
        let candidate = Expression::call(*f, vec![from.clone()]);
        if candidate.apply(row, columns, None) == *to {
            out.push(candidate);
        }
    }

    // String functions keyed on substring position (Left/Right/Mid).
    if let (Some(fs), Some(ts)) = (from_value.as_string(), to.as_string()) {
        if let Some(idx) = fs.find(&ts) {
            let chars_before = fs[..idx].chars().count();
            let len = ts.chars().count();
            if chars_before == 0 {
                out.push(Expression::call(
                    Function::Left,
                    vec![from.clone(), Expression::literal(len as i64)],
                ));
            }
            if chars_before + len == fs.chars().count() {
                out.push(Expression::call(
                    Function::Right,
                    vec![from.clone(), Expression::literal(len as i64)],
                ));
            }
            out.push(Expression::call(
                Function::Mid,
                vec![
                    from.clone(),
                    Expression::literal((chars_before + 1) as i64),
                    Expression::literal(len as i64),
                ],
            ));
        }
    }

    out
}

const UNARY_FUNCTIONS: &[Function] = &[
    Function::Upper,
    Function::Lower,
    Function::Trim,
    Function::Length,
    Function::Negate,
    Function::Absolute,
    Function::Not,
];

/// Enumerate candidate expressions that evaluate to `to` on `row`, starting
/// from `from` (or from scratch if `None`), bounded by nesting `level` and
/// `complexity_bound`. Returns every expression tied for lowest complexity.
pub fn infer(
    from: Option<&Expression>,
    to: &Value,
    row: &[Value],
    columns: &[Column],
    level: u32,
    complexity_bound: u32,
) -> Vec<Expression> {
    let mut seen_values: HashSet<String> = HashSet::new();
    if let Some(f) = from {
        seen_values.insert(f.apply(row, columns, None).to_string());
    }
    let mut found = Vec::new();
    collect(
        from,
        to,
        row,
        columns,
        level,
        complexity_bound,
        &mut seen_values,
        &mut found,
    );

    if found.is_empty() {
        return found;
    }
    let min_complexity = found.iter().map(|e| e.complexity()).min().unwrap();
    found
        .into_iter()
        .filter(|e| e.complexity() == min_complexity)
        .collect()
}

fn collect(
    from: Option<&Expression>,
    to: &Value,
    row: &[Value],
    columns: &[Column],
    level: u32,
    complexity_bound: u32,
    seen_values: &mut HashSet<String>,
    found: &mut Vec<Expression>,
) {
    for candidate in suggest(from, to, row, columns) {
        if candidate.complexity() > complexity_bound {
            continue;
        }
        let value = candidate.apply(row, columns, None);
        if value == *to {
            found.push(candidate);
            continue;
        }
        if level == 0 {
            continue;
        }
        let key = value.to_string();
        if !seen_values.insert(key) {
            continue;
        }
        collect(
            Some(&candidate),
            to,
            row,
            columns,
            level - 1,
            complexity_bound,
            seen_values,
            found,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_additive_gap() {
        let columns = vec![Column::new("A")];
        let row = vec![Value::Int(2)];
        let from = Expression::sibling("A");
        let results = infer(Some(&from), &Value::Int(5), &row, &columns, 2, 50);
        assert!(results
            .iter()
            .any(|e| e.apply(&row, &columns, None) == Value::Int(5)));
    }

    #[test]
    fn infers_upper_from_sibling() {
        let columns = vec![Column::new("Name")];
        let row = vec![Value::string("ada")];
        let results = infer(None, &Value::string("ADA"), &row, &columns, 2, 50);
        assert!(results
            .iter()
            .any(|e| e.apply(&row, &columns, None) == Value::string("ADA")));
    }

    #[test]
    fn infers_left_substring() {
        let columns = vec![Column::new("Name")];
        let row = vec![Value::string("hello world")];
        let from = Expression::sibling("Name");
        let results = infer(Some(&from), &Value::string("hello"), &row, &columns, 1, 50);
        assert!(results
            .iter()
            .any(|e| e.apply(&row, &columns, None) == Value::string("hello")));
    }

    #[test]
    fn returns_only_minimal_complexity_ties() {
        let columns = vec![Column::new("A")];
        let row = vec![Value::Int(2)];
        let results = infer(None, &Value::Int(2), &row, &columns, 1, 50);
        let min = results.iter().map(|e| e.complexity()).min().unwrap();
        assert!(results.iter().all(|e| e.complexity() == min));
    }
}
