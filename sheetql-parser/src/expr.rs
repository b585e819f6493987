//! The expression tree: literals, the "current cell" identity, column
//! references, binary operators, and function calls.

use crate::binary::BinaryOp;
use crate::column::Column;
use crate::function::Function;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// Resolves to the "current cell" value supplied at apply time.
    Identity,
    Sibling(Column),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    Function(Function, Vec<Expression>),
}

impl Expression {
    pub fn literal<V: Into<Value>>(v: V) -> Self {
        Expression::Literal(v.into())
    }

    pub fn sibling<C: Into<Column>>(c: C) -> Self {
        Expression::Sibling(c.into())
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn call(f: Function, args: Vec<Expression>) -> Self {
        Expression::Function(f, args)
    }

    /// Evaluate this expression against a row, using `columns` to resolve
    /// [`Expression::Sibling`] references and `input_value` for
    /// [`Expression::Identity`].
    pub fn apply(&self, row: &[Value], columns: &[Column], input_value: Option<&Value>) -> Value {
        match self {
            Expression::Literal(v) => v.clone(),
            Expression::Identity => input_value.cloned().unwrap_or(Value::Invalid),
            Expression::Sibling(col) => match columns.iter().position(|c| c == col) {
                Some(idx) => row.get(idx).cloned().unwrap_or(Value::Empty),
                None => Value::Invalid,
            },
            Expression::Binary(op, lhs, rhs) => {
                let l = lhs.apply(row, columns, input_value);
                let r = rhs.apply(row, columns, input_value);
                op.apply(&l, &r)
            }
            Expression::Function(f, args) => {
                let values: Vec<Value> = args
                    .iter()
                    .map(|a| a.apply(row, columns, input_value))
                    .collect();
                f.apply(&values)
            }
        }
    }

    /// True when every descendant is constant and, for `Binary`/`Function`
    /// nodes, the operator/function is deterministic.
    pub fn is_constant(&self) -> bool {
        match self {
            Expression::Literal(_) => true,
            Expression::Identity | Expression::Sibling(_) => false,
            Expression::Binary(op, lhs, rhs) => {
                op.deterministic() && lhs.is_constant() && rhs.is_constant()
            }
            Expression::Function(f, args) => {
                f.deterministic() && args.iter().all(|a| a.is_constant())
            }
        }
    }

    /// Fold constant subtrees into `Literal`s, recursively.
    pub fn prepare(&self) -> Expression {
        let folded = match self {
            Expression::Literal(_) | Expression::Identity | Expression::Sibling(_) => {
                self.clone()
            }
            Expression::Binary(op, lhs, rhs) => {
                Expression::Binary(*op, Box::new(lhs.prepare()), Box::new(rhs.prepare()))
            }
            Expression::Function(f, args) => {
                Expression::Function(*f, args.iter().map(|a| a.prepare()).collect())
            }
        };
        if folded.is_constant() {
            let value = folded.apply(&[], &[], None);
            Expression::Literal(value)
        } else {
            folded
        }
    }

    /// Tree-size complexity used to rank inference candidates: literals cost
    /// 10, identity/sibling cost 1, and internal nodes cost `1 + children`.
    pub fn complexity(&self) -> u32 {
        match self {
            Expression::Literal(_) => 10,
            Expression::Identity | Expression::Sibling(_) => 1,
            Expression::Binary(_, lhs, rhs) => 1 + lhs.complexity() + rhs.complexity(),
            Expression::Function(_, args) => {
                1 + args.iter().map(|a| a.complexity()).max().unwrap_or(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_resolves_input_value() {
        let e = Expression::Identity;
        assert_eq!(e.apply(&[], &[], Some(&Value::Int(5))), Value::Int(5));
        assert_eq!(e.apply(&[], &[], None), Value::Invalid);
    }

    #[test]
    fn sibling_past_row_length_is_empty_unknown_column_is_invalid() {
        let columns = vec![Column::new("A"), Column::new("B")];
        let row = vec![Value::Int(1)];
        assert_eq!(
            Expression::sibling("B").apply(&row, &columns, None),
            Value::Empty
        );
        assert_eq!(
            Expression::sibling("Z").apply(&row, &columns, None),
            Value::Invalid
        );
    }

    #[test]
    fn prepare_folds_constant_subtrees() {
        let e = Expression::binary(
            BinaryOp::Add,
            Expression::literal(1i64),
            Expression::literal(2i64),
        );
        assert!(e.is_constant());
        assert_eq!(e.prepare(), Expression::literal(3i64));
    }

    #[test]
    fn prepare_preserves_nondeterministic_subtrees() {
        let e = Expression::call(Function::Random, vec![]);
        assert!(!e.is_constant());
        assert_eq!(e.prepare(), e);
    }

    #[test]
    fn prepare_apply_equivalence() {
        let e = Expression::binary(
            BinaryOp::Mul,
            Expression::sibling("A"),
            Expression::literal(2i64),
        );
        let columns = vec![Column::new("A")];
        let row = vec![Value::Int(3)];
        assert_eq!(
            e.apply(&row, &columns, None),
            e.prepare().apply(&row, &columns, None)
        );
    }

    #[test]
    fn complexity_matches_tree_shape() {
        assert_eq!(Expression::literal(1i64).complexity(), 10);
        assert_eq!(Expression::Identity.complexity(), 1);
        assert_eq!(
            Expression::binary(BinaryOp::Add, Expression::Identity, Expression::Identity)
                .complexity(),
            3
        );
    }
}
