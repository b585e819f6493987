//! In-memory tabular dataset: a 2-D array of [`Value`] plus column headers.

use sheetql_parser::{Column, Value};

use crate::error::{Error, Reason, Result};

#[derive(Debug, Clone)]
pub struct Raster {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    read_only: bool,
}

impl Raster {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Raster {
            columns,
            rows,
            read_only: false,
        }
    }

    pub fn empty() -> Self {
        Raster::new(Vec::new(), Vec::new())
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// First positional match, or `None`.
    pub fn index_of_column(&self, name: &Column) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value, reading a missing trailing cell as `Empty`.
    pub fn get(&self, row: usize, col: usize) -> Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or(Value::Empty)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if self.read_only {
            return Err(Error::new(Reason::ReadOnly));
        }
        assert!(
            row.len() <= self.columns.len(),
            "row has more cells than there are columns"
        );
        self.rows.push(row);
        Ok(())
    }

    pub fn set(&mut self, row: usize, col: usize, value: Value) -> Result<()> {
        if self.read_only {
            return Err(Error::new(Reason::ReadOnly));
        }
        if let Some(r) = self.rows.get_mut(row) {
            if col >= r.len() {
                r.resize(col + 1, Value::Empty);
            }
            r[col] = value;
        }
        Ok(())
    }

    /// Reflexive, symmetric: equal columns (order-sensitive, case-insensitive
    /// per [`Column`]'s `Eq`) and equal rows, ignoring `read_only`.
    pub fn compare(&self, other: &Raster) -> bool {
        self.columns == other.columns && self.rows == other.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Raster {
        Raster::new(
            vec![Column::new("A"), Column::new("B")],
            vec![
                vec![Value::Int(1), Value::Int(2)],
                vec![Value::Int(3)], // missing trailing cell
            ],
        )
    }

    #[test]
    fn missing_trailing_cell_reads_as_empty() {
        let r = sample();
        assert_eq!(r.get(1, 1), Value::Empty);
    }

    #[test]
    fn mutation_on_read_only_raster_is_rejected() {
        let mut r = sample().read_only();
        assert!(r.set(0, 0, Value::Int(9)).is_err());
        assert!(r.push_row(vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn compare_is_reflexive_and_symmetric() {
        let a = sample();
        let b = sample();
        assert!(a.compare(&a));
        assert!(a.compare(&b));
        assert!(b.compare(&a));
    }

    #[test]
    fn index_of_column_is_case_insensitive() {
        let r = sample();
        assert_eq!(r.index_of_column(&Column::new("a")), Some(0));
        assert_eq!(r.index_of_column(&Column::new("z")), None);
    }
}
