//! Pull-based, chunked, cancellable row source.
//!
//! A `Stream` is single-consumer: a given instance must not have overlapping
//! `fetch` calls in flight — it owns its own cursor. [`Stream::reset_clone`]
//! is the way to obtain an independent cursor for repeatable reads or
//! raster materialization.

use sheetql_parser::{Column, Expression, Value};

use crate::error::Fallible;
use crate::job::Job;
use crate::raster::Raster;

/// Default batch size used by in-process streams absent an explicit size.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// One pulled batch: the rows, and whether more remain.
pub struct Batch {
    pub rows: Vec<Vec<Value>>,
    pub has_next: bool,
}

/// A chunked row source. Implementors must make repeat calls after
/// `has_next == false` idempotent (empty batch or no-op).
pub trait Stream: Send {
    fn column_names(&mut self) -> Vec<Column>;

    /// Deliver one batch. Implementations should poll `job.cancelled()`
    /// between internal steps and stop (returning `has_next: false`)
    /// cooperatively once it is set.
    fn fetch(&mut self, job: &Job) -> Fallible<Batch>;

    /// A fresh, reset-to-start instance reading the same underlying data.
    fn reset_clone(&self) -> Box<dyn Stream>;

    /// Drain the whole stream into a `Raster`, honoring cancellation.
    fn materialize(&mut self, job: &Job) -> Fallible<Raster> {
        let columns = self.column_names();
        let mut rows = Vec::new();
        loop {
            if job.cancelled() {
                log::trace!("stream materialize: job cancelled after {} rows", rows.len());
                break;
            }
            let batch = self.fetch(job)?;
            rows.extend(batch.rows);
            if !batch.has_next {
                break;
            }
        }
        Ok(Raster::new(columns, rows))
    }
}

/// Feeds fixed rows out of memory in [`DEFAULT_BATCH_SIZE`] chunks — the
/// reference `Stream` used by tests and by raster-to-stream bridging.
pub struct VecStream {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    position: usize,
    batch_size: usize,
}

impl VecStream {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        VecStream {
            columns,
            rows,
            position: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Stream for VecStream {
    fn column_names(&mut self) -> Vec<Column> {
        self.columns.clone()
    }

    fn fetch(&mut self, _job: &Job) -> Fallible<Batch> {
        let end = (self.position + self.batch_size).min(self.rows.len());
        let rows = self.rows[self.position..end].to_vec();
        self.position = end;
        Ok(Batch {
            rows,
            has_next: self.position < self.rows.len(),
        })
    }

    fn reset_clone(&self) -> Box<dyn Stream> {
        Box::new(VecStream::new(self.columns.clone(), self.rows.clone()))
    }
}

/// Yields up to `n` rows total from its source, then stops pulling further.
pub struct LimitTransformer {
    source: Box<dyn Stream>,
    limit: usize,
    position: usize,
    stopped: bool,
}

impl LimitTransformer {
    pub fn new(source: Box<dyn Stream>, limit: usize) -> Self {
        LimitTransformer {
            source,
            limit,
            position: 0,
            stopped: false,
        }
    }
}

impl Stream for LimitTransformer {
    fn column_names(&mut self) -> Vec<Column> {
        self.source.column_names()
    }

    fn fetch(&mut self, job: &Job) -> Fallible<Batch> {
        if self.stopped || self.position >= self.limit {
            self.stopped = true;
            return Ok(Batch {
                rows: Vec::new(),
                has_next: false,
            });
        }
        let upstream = self.source.fetch(job)?;
        let remaining = self.limit - self.position;
        let take = remaining.min(upstream.rows.len());
        let rows: Vec<_> = upstream.rows.into_iter().take(take).collect();
        self.position += rows.len();
        let reached_limit = self.position >= self.limit;
        if reached_limit {
            self.stopped = true;
        }
        Ok(Batch {
            rows,
            has_next: upstream.has_next && !reached_limit,
        })
    }

    fn reset_clone(&self) -> Box<dyn Stream> {
        Box::new(LimitTransformer::new(self.source.reset_clone(), self.limit))
    }
}

/// Projects each incoming row onto a fixed set of columns, resolving
/// indices against the source's header on first pull.
pub struct ColumnsTransformer {
    source: Box<dyn Stream>,
    wanted: Vec<Column>,
    indices: Option<Vec<usize>>,
}

impl ColumnsTransformer {
    pub fn new(source: Box<dyn Stream>, wanted: Vec<Column>) -> Self {
        ColumnsTransformer {
            source,
            wanted,
            indices: None,
        }
    }

    fn resolved_indices(&mut self) -> Vec<usize> {
        if self.indices.is_none() {
            let header = self.source.column_names();
            let indices = self
                .wanted
                .iter()
                .filter_map(|c| header.iter().position(|h| h == c))
                .collect();
            self.indices = Some(indices);
        }
        self.indices.clone().unwrap()
    }
}

impl Stream for ColumnsTransformer {
    fn column_names(&mut self) -> Vec<Column> {
        let indices = self.resolved_indices();
        let header = self.source.column_names();
        indices.iter().map(|&i| header[i].clone()).collect()
    }

    fn fetch(&mut self, job: &Job) -> Fallible<Batch> {
        let indices = self.resolved_indices();
        let upstream = self.source.fetch(job)?;
        let rows = upstream
            .rows
            .into_iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(Value::Empty))
                    .collect()
            })
            .collect();
        Ok(Batch {
            rows,
            has_next: upstream.has_next,
        })
    }

    fn reset_clone(&self) -> Box<dyn Stream> {
        Box::new(ColumnsTransformer::new(
            self.source.reset_clone(),
            self.wanted.clone(),
        ))
    }
}

/// Appends/overwrites per-row computed columns, mirroring
/// `RasterData::calculate` but row-at-a-time. Expressions are
/// `prepare()`-folded once, up front.
pub struct CalculateTransformer {
    source: Box<dyn Stream>,
    targets: Vec<(Column, Expression)>,
    columns: Option<Vec<Column>>,
    target_indices: Option<Vec<usize>>,
}

impl CalculateTransformer {
    pub fn new(source: Box<dyn Stream>, targets: Vec<(Column, Expression)>) -> Self {
        let targets = targets
            .into_iter()
            .map(|(c, e)| (c, e.prepare()))
            .collect();
        CalculateTransformer {
            source,
            targets,
            columns: None,
            target_indices: None,
        }
    }

    fn resolve(&mut self) {
        if self.columns.is_some() {
            return;
        }
        let mut columns = self.source.column_names();
        let mut indices = Vec::with_capacity(self.targets.len());
        for (col, _) in &self.targets {
            match columns.iter().position(|c| c == col) {
                Some(idx) => indices.push(idx),
                None => {
                    columns.push(col.clone());
                    indices.push(columns.len() - 1);
                }
            }
        }
        self.columns = Some(columns);
        self.target_indices = Some(indices);
    }
}

impl Stream for CalculateTransformer {
    fn column_names(&mut self) -> Vec<Column> {
        self.resolve();
        self.columns.clone().unwrap()
    }

    fn fetch(&mut self, job: &Job) -> Fallible<Batch> {
        self.resolve();
        let columns = self.columns.clone().unwrap();
        let indices = self.target_indices.clone().unwrap();
        let source_columns = self.source.column_names();
        let upstream = self.source.fetch(job)?;
        let rows = upstream
            .rows
            .into_iter()
            .map(|mut row| {
                row.resize(columns.len(), Value::Empty);
                let pristine = row.clone();
                for ((_, expr), idx) in self.targets.iter().zip(indices.iter()) {
                    let input = pristine.get(*idx).cloned().unwrap_or(Value::Empty);
                    row[*idx] = expr.apply(&pristine, &source_columns, Some(&input));
                }
                row
            })
            .collect();
        Ok(Batch {
            rows,
            has_next: upstream.has_next,
        })
    }

    fn reset_clone(&self) -> Box<dyn Stream> {
        Box::new(CalculateTransformer::new(
            self.source.reset_clone(),
            self.targets.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetql_parser::BinaryOp;

    fn numbers(n: usize) -> VecStream {
        let rows = (0..n).map(|i| vec![Value::Int(i as i64)]).collect();
        VecStream::new(vec![Column::new("N")], rows)
    }

    #[test]
    fn limit_transformer_caps_total_rows_across_batches() {
        let job = Job::new();
        let mut stream = LimitTransformer::new(Box::new(numbers(600)), 300);
        let raster = stream.materialize(&job).unwrap();
        assert_eq!(raster.row_count(), 300);
    }

    #[test]
    fn columns_transformer_projects_and_drops_unknown() {
        let source = VecStream::new(
            vec![Column::new("A"), Column::new("B")],
            vec![vec![Value::Int(1), Value::Int(2)]],
        );
        let mut stream =
            ColumnsTransformer::new(Box::new(source), vec![Column::new("B"), Column::new("Z")]);
        let job = Job::new();
        assert_eq!(stream.column_names(), vec![Column::new("B")]);
        let raster = stream.materialize(&job).unwrap();
        assert_eq!(raster.get(0, 0), Value::Int(2));
    }

    #[test]
    fn calculate_transformer_appends_column() {
        let mut stream = CalculateTransformer::new(
            Box::new(numbers(3)),
            vec![(
                Column::new("Doubled"),
                Expression::binary(BinaryOp::Mul, Expression::sibling("N"), Expression::literal(2i64)),
            )],
        );
        let job = Job::new();
        let raster = stream.materialize(&job).unwrap();
        assert_eq!(raster.get(1, 1), Value::Int(2));
    }

    /// A later target must not see an earlier target's overwrite within the
    /// same `calculate` call — every target sees the pristine incoming row,
    /// matching `RasterData::calculate`.
    #[test]
    fn calculate_transformer_targets_all_see_the_pristine_row() {
        let source = VecStream::new(vec![Column::new("N")], vec![vec![Value::Int(5)]]);
        let mut stream = CalculateTransformer::new(
            Box::new(source),
            vec![
                (Column::new("N"), Expression::literal(99i64)),
                (Column::new("Doubled"), Expression::binary(
                    BinaryOp::Mul,
                    Expression::sibling("N"),
                    Expression::literal(2i64),
                )),
            ],
        );
        let job = Job::new();
        let raster = stream.materialize(&job).unwrap();
        assert_eq!(raster.get(0, 0), Value::Int(99));
        assert_eq!(raster.get(0, 1), Value::Int(10));
    }

    #[test]
    fn reset_clone_yields_independent_cursor() {
        let stream = numbers(10);
        let mut a = stream.reset_clone();
        let job = Job::new();
        let _ = a.fetch(&job).unwrap();
        let mut b = stream.reset_clone();
        let first = b.fetch(&job).unwrap();
        assert_eq!(first.rows[0][0], Value::Int(0));
    }
}
