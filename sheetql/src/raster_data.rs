//! `RasterData`: a lazily-computed, memoized [`Raster`] pipeline. Every
//! operation returns a new `RasterData` whose future applies the
//! transformation over the source's raster; every produced raster is
//! `read_only`.

use std::collections::HashSet;

use itertools::Itertools;
use rand::Rng;
use sheetql_parser::{Column, Expression, Value};

use crate::aggregation::Aggregation;
use crate::lazy::LazyRaster;
use crate::raster::Raster;

#[derive(Clone)]
pub struct RasterData {
    lazy: LazyRaster,
}

impl RasterData {
    pub fn from_raster(raster: Raster) -> Self {
        RasterData {
            lazy: LazyRaster::ready(raster.read_only()),
        }
    }

    pub fn materialize(&self) -> Raster {
        self.lazy.get()
    }

    fn derive<F>(&self, f: F) -> RasterData
    where
        F: FnOnce(Raster) -> Raster + Send + 'static,
    {
        let source = self.lazy.clone();
        RasterData {
            lazy: LazyRaster::new(move || f(source.get()).read_only()),
        }
    }

    /// First column's values become new headers; remaining columns become
    /// rows; the first column (now dropped) is the only input column that
    /// does not reappear as a row.
    pub fn transpose(&self) -> RasterData {
        self.derive(|src| {
            if src.column_count() == 0 {
                return Raster::empty();
            }
            let new_columns: Vec<Column> = (0..src.row_count())
                .map(|r| Column::new(src.get(r, 0).as_string().unwrap_or_default()))
                .collect();
            let mut rows = Vec::new();
            for col_idx in 1..src.column_count() {
                let row: Vec<Value> = (0..src.row_count()).map(|r| src.get(r, col_idx)).collect();
                rows.push(row);
            }
            Raster::new(new_columns, rows)
        })
    }

    /// Keep only the named columns, in the given order; unknown names are
    /// dropped silently.
    pub fn select_columns(&self, wanted: Vec<Column>) -> RasterData {
        self.derive(move |src| {
            let indices: Vec<usize> = wanted
                .iter()
                .filter_map(|c| src.index_of_column(c))
                .collect();
            let columns: Vec<Column> = indices.iter().map(|&i| src.columns()[i].clone()).collect();
            let rows = (0..src.row_count())
                .map(|r| indices.iter().map(|&i| src.get(r, i)).collect())
                .collect();
            Raster::new(columns, rows)
        })
    }

    /// `targets`, in the given order, are applied in sequence: an existing
    /// column name replaces that column's values, a new name appends a
    /// column. Repeating a target name is last-write-wins, per the
    /// caller-controlled iteration order of `targets` (see DESIGN.md).
    pub fn calculate(&self, targets: Vec<(Column, Expression)>) -> RasterData {
        self.derive(move |src| {
            let mut columns = src.columns().to_vec();
            let mut new_exprs: Vec<(usize, Expression)> = Vec::new();
            for (col, expr) in targets {
                let prepared = expr.prepare();
                match columns.iter().position(|c| *c == col) {
                    Some(idx) => {
                        if let Some(slot) = new_exprs.iter_mut().find(|(i, _)| *i == idx) {
                            slot.1 = prepared;
                        } else {
                            new_exprs.push((idx, prepared));
                        }
                    }
                    None => {
                        columns.push(col);
                        new_exprs.push((columns.len() - 1, prepared));
                    }
                }
            }
            let mut rows: Vec<Vec<Value>> = src.rows().to_vec();
            for (row_idx, row) in rows.iter_mut().enumerate() {
                row.resize(columns.len(), Value::Empty);
                for (target_idx, expr) in &new_exprs {
                    let input = row.get(*target_idx).cloned().unwrap_or(Value::Empty);
                    let value = expr.apply(&src_row(src, row_idx), src.columns(), Some(&input));
                    row[*target_idx] = value;
                }
            }
            Raster::new(columns, rows)
        })
    }

    pub fn limit(&self, n: usize) -> RasterData {
        self.derive(move |src| {
            let rows = src.rows().iter().take(n).cloned().collect();
            Raster::new(src.columns().to_vec(), rows)
        })
    }

    /// Sampling without replacement: attach a uniform random key per row,
    /// sort by key ascending, take the first `min(n, len)`.
    pub fn random(&self, n: usize) -> RasterData {
        self.derive(move |src| {
            let mut rng = rand::thread_rng();
            let mut keyed: Vec<(f64, Vec<Value>)> = src
                .rows()
                .iter()
                .map(|row| (rng.gen_range(0.0..1.0), row.clone()))
                .collect();
            keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            let rows = keyed.into_iter().take(n).map(|(_, row)| row).collect();
            Raster::new(src.columns().to_vec(), rows)
        })
    }

    /// Preserves first occurrence; the uniqueness key is the row's full
    /// value sequence.
    pub fn distinct(&self) -> RasterData {
        self.derive(|src| {
            let mut seen: HashSet<String> = HashSet::new();
            let mut rows = Vec::new();
            for row in src.rows() {
                let key = row_key(row);
                if seen.insert(key) {
                    rows.push(row.clone());
                }
            }
            Raster::new(src.columns().to_vec(), rows)
        })
    }

    /// Groups rows by the evaluated `groups` expressions (in the given
    /// order), accumulating per-`values` bags; at the end each bag is
    /// reduced to one value. Column order is groups first, then values, in
    /// the order given.
    pub fn aggregate(
        &self,
        groups: Vec<(Column, Expression)>,
        values: Vec<Aggregation>,
    ) -> RasterData {
        self.derive(move |src| {
            let mut order: Vec<Vec<Value>> = Vec::new();
            let mut bags: indexmap_like::Groups = indexmap_like::Groups::new();

            for (row_idx, row) in src.rows().iter().enumerate() {
                let key: Vec<Value> = groups
                    .iter()
                    .map(|(_, expr)| expr.apply(row, src.columns(), None))
                    .collect();
                let key_str = row_key(&key);
                if !bags.contains(&key_str) {
                    order.push(key.clone());
                }
                let entry = bags.entry(key_str);
                for agg in &values {
                    let mapped = agg.map.apply(&src_row(src, row_idx), src.columns(), None);
                    entry.push(agg.target.name().to_string(), mapped);
                }
            }

            let mut columns: Vec<Column> = groups.iter().map(|(c, _)| c.clone()).collect();
            columns.extend(values.iter().map(|a| a.target.clone()));

            let mut rows = Vec::new();
            for key in order {
                let key_str = row_key(&key);
                let mut row = key.clone();
                for agg in &values {
                    let bag = bags.bag(&key_str, agg.target.name());
                    row.push(agg.reduce_bag(&bag));
                }
                rows.push(row);
            }
            Raster::new(columns, rows)
        })
    }

    /// Rearranges rows so that distinct `horizontal` tuples become output
    /// columns. Missing cells are `Invalid`.
    pub fn pivot(
        &self,
        horizontal: Vec<Column>,
        vertical: Vec<Column>,
        values: Vec<Column>,
    ) -> RasterData {
        self.derive(move |src| {
            let mut vertical_order: Vec<Vec<Value>> = Vec::new();
            let mut horizontal_order: Vec<String> = Vec::new();
            let mut cells: std::collections::HashMap<(String, String, usize), Value> =
                std::collections::HashMap::new();

            for row in src.rows() {
                let v_key: Vec<Value> = vertical
                    .iter()
                    .filter_map(|c| src.index_of_column(c))
                    .map(|i| row.get(i).cloned().unwrap_or(Value::Empty))
                    .collect();
                let h_label = horizontal
                    .iter()
                    .filter_map(|c| src.index_of_column(c))
                    .map(|i| row.get(i).cloned().unwrap_or(Value::Empty).to_string())
                    .join("_");

                let v_str = row_key(&v_key);
                if !vertical_order.iter().any(|k| row_key(k) == v_str) {
                    vertical_order.push(v_key.clone());
                }
                if !horizontal_order.contains(&h_label) {
                    horizontal_order.push(h_label.clone());
                }
                for (vi, value_col) in values.iter().enumerate() {
                    if let Some(idx) = src.index_of_column(value_col) {
                        cells
                            .entry((v_str.clone(), h_label.clone(), vi))
                            .or_insert_with(|| row.get(idx).cloned().unwrap_or(Value::Empty));
                    }
                }
            }

            let mut columns = vertical.clone();
            for h_label in &horizontal_order {
                for value_col in &values {
                    columns.push(Column::new(format!("{h_label}_{value_col}")));
                }
            }

            let mut rows = Vec::new();
            for v_key in &vertical_order {
                let mut row = v_key.clone();
                let v_str = row_key(v_key);
                for h_label in &horizontal_order {
                    for vi in 0..values.len() {
                        let value = cells
                            .get(&(v_str.clone(), h_label.clone(), vi))
                            .cloned()
                            .unwrap_or(Value::Invalid);
                        row.push(value);
                    }
                }
                rows.push(row);
            }
            Raster::new(columns, rows)
        })
    }

    /// Distinct values of `expr` evaluated per row, preserving first
    /// occurrence order. Not itself a `Data` operation — a terminal query.
    pub fn unique(&self, expr: &Expression) -> Vec<Value> {
        let src = self.materialize();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in src.rows() {
            let value = expr.apply(row, src.columns(), None);
            let key = value.to_string();
            if seen.insert(key) {
                out.push(value);
            }
        }
        out
    }

    /// Keeps rows where `cond` evaluates to `true`; anything else (`false`,
    /// `Invalid`, non-boolean) is dropped.
    pub fn filter(&self, cond: &Expression) -> RasterData {
        let cond = cond.prepare();
        self.derive(move |src| {
            let rows = src
                .rows()
                .iter()
                .filter(|row| cond.apply(row, src.columns(), None).as_bool() == Some(true))
                .cloned()
                .collect();
            Raster::new(src.columns().to_vec(), rows)
        })
    }

    /// Stable multi-key sort; later keys break ties among earlier ones.
    pub fn sort(&self, keys: &[crate::sql::SortKey]) -> RasterData {
        let keys: Vec<crate::sql::SortKey> = keys
            .iter()
            .map(|k| crate::sql::SortKey {
                expr: k.expr.prepare(),
                ..k.clone()
            })
            .collect();
        self.derive(move |src| {
            let mut rows = src.rows().to_vec();
            rows.sort_by(|a, b| {
                for key in &keys {
                    let va = key.expr.apply(a, src.columns(), None);
                    let vb = key.expr.apply(b, src.columns(), None);
                    let ordering = match key.force {
                        crate::sql::SortForce::Numeric => va
                            .as_double()
                            .partial_cmp(&vb.as_double())
                            .unwrap_or(std::cmp::Ordering::Equal),
                        crate::sql::SortForce::String => va.as_string().cmp(&vb.as_string()),
                        crate::sql::SortForce::Natural => {
                            va.compare(&vb).unwrap_or(std::cmp::Ordering::Equal)
                        }
                    };
                    let ordering = if key.descending { ordering.reverse() } else { ordering };
                    if ordering != std::cmp::Ordering::Equal {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
            Raster::new(src.columns().to_vec(), rows)
        })
    }

    /// Equality join on one key column per side. `Inner` drops unmatched
    /// left rows; `Left` keeps them, padding the right side with `Empty`.
    /// A left row with several matches produces one output row per match.
    pub fn join(
        &self,
        other: &RasterData,
        left_key: &Column,
        right_key: &Column,
        how: JoinKind,
    ) -> RasterData {
        let other = other.clone();
        let left_key = left_key.clone();
        let right_key = right_key.clone();
        self.derive(move |src| {
            let right = other.materialize();
            let (left_idx, right_idx) = match (src.index_of_column(&left_key), right.index_of_column(&right_key)) {
                (Some(l), Some(r)) => (l, r),
                _ => return Raster::empty(),
            };

            let mut columns = src.columns().to_vec();
            columns.extend(right.columns().iter().cloned());

            let mut rows = Vec::new();
            for left_row in src.rows() {
                let key = left_row.get(left_idx).cloned().unwrap_or(Value::Empty);
                let mut matched = false;
                for right_row in right.rows() {
                    let candidate = right_row.get(right_idx).cloned().unwrap_or(Value::Empty);
                    if key.value_eq(&candidate) {
                        matched = true;
                        let mut row = left_row.clone();
                        row.extend(right_row.iter().cloned());
                        rows.push(row);
                    }
                }
                if !matched && how == JoinKind::Left {
                    let mut row = left_row.clone();
                    row.extend(std::iter::repeat(Value::Empty).take(right.column_count()));
                    rows.push(row);
                }
            }
            Raster::new(columns, rows)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

fn src_row(src: &Raster, idx: usize) -> Vec<Value> {
    src.rows().get(idx).cloned().unwrap_or_default()
}

fn row_key(row: &[Value]) -> String {
    row.iter().map(|v| v.to_string()).join("\u{1f}")
}

/// A tiny insertion-ordered multimap used only by `aggregate`, named for what
/// it approximates (`indexmap`'s ordered entry API) without adding the
/// dependency for a single call site.
mod indexmap_like {
    use std::collections::HashMap;

    use sheetql_parser::Value;

    #[derive(Default)]
    pub struct Groups {
        bags: HashMap<String, HashMap<String, Vec<Value>>>,
    }

    pub struct Entry<'a> {
        map: &'a mut HashMap<String, Vec<Value>>,
    }

    impl<'a> Entry<'a> {
        pub fn push(&mut self, target: String, value: Value) {
            self.map.entry(target).or_default().push(value);
        }
    }

    impl Groups {
        pub fn new() -> Self {
            Groups::default()
        }

        pub fn contains(&self, key: &str) -> bool {
            self.bags.contains_key(key)
        }

        pub fn entry(&mut self, key: String) -> Entry<'_> {
            Entry {
                map: self.bags.entry(key).or_default(),
            }
        }

        pub fn bag(&self, key: &str, target: &str) -> Vec<Value> {
            self.bags
                .get(key)
                .and_then(|m| m.get(target))
                .cloned()
                .unwrap_or_default()
        }
    }
}
