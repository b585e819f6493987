//! `SqlData`: an accumulated SQL query that grows by wrapping itself in a
//! new `SELECT ... FROM (prev) AS alias`. Every operation either lowers
//! cleanly and returns `Some`, or returns `None` the instant any
//! sub-expression can't be translated — callers fall back to materializing
//! the prior `SqlData` and finishing the operation on a stream/raster.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use sheetql_parser::{Column, Expression};

use crate::aggregation::Aggregation;
use crate::sql::dialect::Dialect;

/// How a sort key's values should be coerced before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortForce {
    Natural,
    Numeric,
    String,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub expr: Expression,
    pub descending: bool,
    pub force: SortForce,
}

#[derive(Clone)]
pub struct SqlData {
    pub sql: String,
    pub dialect: Arc<dyn Dialect>,
    pub columns: Vec<Column>,
}

impl SqlData {
    pub fn from_table(table: &str, columns: Vec<Column>, dialect: Arc<dyn Dialect>) -> Self {
        SqlData {
            sql: format!("SELECT * FROM {}", dialect.table_identifier(table)),
            dialect,
            columns,
        }
    }

    /// Deterministic alias for this query, derived from a hash of its SQL
    /// text so that repeated lowerings of the same pipeline agree.
    fn alias(&self) -> String {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.sql.hash(&mut hasher);
        format!("t{:x}", hasher.finish())
    }

    fn wrap(&self, select_list: String, columns: Vec<Column>) -> SqlData {
        let alias = self.dialect.table_identifier(&self.alias());
        SqlData {
            sql: format!("SELECT {select_list} FROM ({}) AS {alias}", self.sql),
            dialect: self.dialect.clone(),
            columns,
        }
    }

    fn wrap_clause(&self, select_list: &str, clause: &str, columns: Vec<Column>) -> SqlData {
        let alias = self.dialect.table_identifier(&self.alias());
        SqlData {
            sql: format!("SELECT {select_list} FROM ({}) AS {alias} {clause}", self.sql),
            dialect: self.dialect.clone(),
            columns,
        }
    }

    /// `SELECT (existing cols with overrides), (new cols) FROM (prev)`.
    /// Repeating a target column is last-write-wins, mirroring
    /// `RasterData::calculate`.
    pub fn calculate(&self, targets: &[(Column, Expression)]) -> Option<SqlData> {
        let mut columns = self.columns.clone();
        let mut select: Vec<Option<String>> = columns
            .iter()
            .map(|c| Some(self.dialect.column_identifier(c)))
            .collect();

        for (col, expr) in targets {
            let prepared = expr.prepare();
            let existing_idx = columns.iter().position(|c| c == col);
            let input_sql = existing_idx.map(|i| self.dialect.column_identifier(&columns[i]));
            let sql = self
                .dialect
                .expression_to_sql(&prepared, &columns, input_sql.as_deref())?;
            let rendered = format!("{sql} AS {}", self.dialect.column_identifier(col));
            match existing_idx {
                Some(i) => select[i] = Some(rendered),
                None => {
                    columns.push(col.clone());
                    select.push(Some(rendered));
                }
            }
        }

        let select_list = select.into_iter().collect::<Option<Vec<_>>>()?.join(", ");
        Some(self.wrap(select_list, columns))
    }

    /// Trivial wrapper: drops unknown names rather than failing.
    pub fn select_columns(&self, wanted: &[Column]) -> Option<SqlData> {
        let known: Vec<Column> = wanted
            .iter()
            .filter(|c| self.columns.contains(c))
            .cloned()
            .collect();
        let select_list = known
            .iter()
            .map(|c| self.dialect.column_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        Some(self.wrap(select_list, known))
    }

    pub fn limit(&self, n: usize) -> Option<SqlData> {
        Some(self.wrap_clause("*", &format!("LIMIT {n}"), self.columns.clone()))
    }

    pub fn offset(&self, n: usize) -> Option<SqlData> {
        Some(self.wrap_clause("*", &format!("OFFSET {n}"), self.columns.clone()))
    }

    pub fn distinct(&self) -> Option<SqlData> {
        Some(self.wrap("DISTINCT *".to_string(), self.columns.clone()))
    }

    /// `WHERE expression_to_sql(cond.prepare())`.
    pub fn filter(&self, cond: &Expression) -> Option<SqlData> {
        let predicate = self
            .dialect
            .expression_to_sql(&cond.prepare(), &self.columns, None)?;
        Some(self.wrap_clause("*", &format!("WHERE {predicate}"), self.columns.clone()))
    }

    /// `ORDER BY` the dialect's random function, capped at `n` rows.
    pub fn random(&self, n: usize) -> Option<SqlData> {
        let clause = format!("ORDER BY {} LIMIT {n}", self.dialect.random_function());
        Some(self.wrap_clause("*", &clause, self.columns.clone()))
    }

    pub fn sort(&self, orders: &[SortKey]) -> Option<SqlData> {
        let mut parts = Vec::with_capacity(orders.len());
        for key in orders {
            let sql = self
                .dialect
                .expression_to_sql(&key.expr.prepare(), &self.columns, None)?;
            let forced = match key.force {
                SortForce::Natural => sql,
                SortForce::Numeric => format!("CAST({sql} AS REAL)"),
                SortForce::String => format!("CAST({sql} AS TEXT)"),
            };
            let direction = if key.descending { "DESC" } else { "ASC" };
            parts.push(format!("{forced} {direction}"));
        }
        let clause = format!("ORDER BY {}", parts.join(", "));
        Some(self.wrap_clause("*", &clause, self.columns.clone()))
    }

    /// `SELECT group expressions + aggregations; GROUP BY group
    /// expressions`. Column order is groups first, then aggregation
    /// targets, matching `RasterData::aggregate`.
    pub fn aggregate(
        &self,
        groups: &[(Column, Expression)],
        values: &[Aggregation],
    ) -> Option<SqlData> {
        let mut group_sql = Vec::with_capacity(groups.len());
        let mut select = Vec::with_capacity(groups.len() + values.len());
        let mut columns = Vec::with_capacity(groups.len() + values.len());

        for (col, expr) in groups {
            let sql = self
                .dialect
                .expression_to_sql(&expr.prepare(), &self.columns, None)?;
            select.push(format!("{sql} AS {}", self.dialect.column_identifier(col)));
            group_sql.push(sql);
            columns.push(col.clone());
        }
        for agg in values {
            select.push(self.dialect.aggregation_to_sql(agg, &self.columns)?);
            columns.push(agg.target.clone());
        }

        let clause = if group_sql.is_empty() {
            String::new()
        } else {
            format!("GROUP BY {}", group_sql.join(", "))
        };
        Some(self.wrap_clause(&select.join(", "), &clause, columns))
    }

    /// `SELECT DISTINCT expr AS _value FROM (prev)`; callers materialize
    /// the result rather than chaining further SQL off it.
    pub fn unique(&self, expr: &Expression) -> Option<SqlData> {
        let sql = self
            .dialect
            .expression_to_sql(&expr.prepare(), &self.columns, None)?;
        let value_column = Column::new("_value");
        Some(self.wrap(
            format!("DISTINCT {sql} AS {}", self.dialect.column_identifier(&value_column)),
            vec![value_column],
        ))
    }

    /// Never lowered: these require a shape change SQL can't express
    /// without knowing the distinct values up front.
    pub fn transpose(&self) -> Option<SqlData> {
        None
    }

    pub fn pivot(&self) -> Option<SqlData> {
        None
    }

    pub fn flatten(&self) -> Option<SqlData> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::GenericDialect;
    use sheetql_parser::{BinaryOp, Function, Value};

    fn base() -> SqlData {
        SqlData::from_table(
            "orders",
            vec![Column::new("Amount"), Column::new("Region")],
            Arc::new(GenericDialect),
        )
    }

    #[test]
    fn calculate_wraps_and_appends_column() {
        let sql = base()
            .calculate(&[(
                Column::new("Doubled"),
                Expression::binary(BinaryOp::Mul, Expression::sibling("Amount"), Expression::literal(2i64)),
            )])
            .unwrap();
        assert!(sql.sql.contains("AS \"Doubled\""));
        assert_eq!(sql.columns.len(), 3);
    }

    #[test]
    fn calculate_falls_back_on_unlowerable_function() {
        let sql = base().calculate(&[(
            Column::new("Fixed"),
            Expression::call(
                Function::RegexSubstitute,
                vec![
                    Expression::sibling("Region"),
                    Expression::literal("x"),
                    Expression::literal("y"),
                ],
            ),
        )]);
        assert!(sql.is_none());
    }

    #[test]
    fn select_columns_drops_unknown() {
        let sql = base()
            .select_columns(&[Column::new("Region"), Column::new("Nope")])
            .unwrap();
        assert_eq!(sql.columns, vec![Column::new("Region")]);
    }

    #[test]
    fn filter_produces_where_clause() {
        let cond = Expression::binary(
            BinaryOp::Gt,
            Expression::sibling("Amount"),
            Expression::literal(10i64),
        );
        let sql = base().filter(&cond).unwrap();
        assert!(sql.sql.contains("WHERE"));
    }

    #[test]
    fn aggregate_groups_by_expression_and_applies_reduce() {
        let sql = base()
            .aggregate(
                &[(Column::new("Region"), Expression::sibling("Region"))],
                &[Aggregation::new(
                    Column::new("Total"),
                    Expression::sibling("Amount"),
                    Function::Sum,
                )],
            )
            .unwrap();
        assert!(sql.sql.contains("GROUP BY"));
        assert!(sql.sql.contains("SUM("));
        assert_eq!(sql.columns, vec![Column::new("Region"), Column::new("Total")]);
    }

    #[test]
    fn unlowerable_reduce_falls_back() {
        let sql = base().aggregate(
            &[],
            &[Aggregation::new(
                Column::new("AnyOne"),
                Expression::sibling("Amount"),
                Function::RandomItem,
            )],
        );
        assert!(sql.is_none());
    }

    #[test]
    fn transpose_pivot_flatten_never_lower() {
        let b = base();
        assert!(b.transpose().is_none());
        assert!(b.pivot().is_none());
        assert!(b.flatten().is_none());
    }

    #[test]
    fn value_invalid_poisons_calculate() {
        let sql = base()
            .calculate(&[(Column::new("Bad"), Expression::literal(Value::Invalid))])
            .unwrap();
        assert!(sql.sql.contains("(1/0)"));
    }
}
