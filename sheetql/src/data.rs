//! `Data`: the uniform pipeline handle from §3/§4 — a step transforms one
//! `Data` into another regardless of which backend (raster, stream, SQL)
//! is doing the work underneath.
//!
//! SQL lowering is always attempted first when the backend is
//! [`Data::Sql`]; the instant a sub-expression can't translate, the
//! operation falls back to the stream (or materialized raster)
//! implementation of the same operation, per §4.8/§7.

use std::sync::Arc;

use sheetql_parser::{Column, Expression};

use crate::aggregation::Aggregation;
use crate::error::Fallible;
use crate::job::Job;
use crate::raster::Raster;
use crate::raster_data::{JoinKind, RasterData};
use crate::sql::{SortKey, SqlData};
use crate::stream::{CalculateTransformer, ColumnsTransformer, LimitTransformer, Stream};

/// Runs a built [`SqlData`] query against its real backing database and
/// returns the result rows as a [`Stream`]. The engine only builds query
/// text; executing it against SQLite/Postgres/etc. is an external
/// collaborator's responsibility (see §6).
pub trait SqlExecutor: Send + Sync {
    fn execute(&self, sql: &SqlData) -> Box<dyn Stream>;
}

/// A pipeline value backed by one of the three concrete engines.
pub enum Data {
    Raster(RasterData),
    Stream(Box<dyn Stream>),
    Sql(SqlData, Arc<dyn SqlExecutor>),
}

impl Data {
    pub fn from_raster(raster: Raster) -> Data {
        Data::Raster(RasterData::from_raster(raster))
    }

    pub fn from_stream(stream: Box<dyn Stream>) -> Data {
        Data::Stream(stream)
    }

    pub fn from_sql(sql: SqlData, executor: Arc<dyn SqlExecutor>) -> Data {
        Data::Sql(sql, executor)
    }

    pub fn materialize(self, job: &Job) -> Fallible<Raster> {
        match self {
            Data::Raster(r) => Ok(r.materialize()),
            Data::Stream(mut s) => s.materialize(job),
            Data::Sql(sql, executor) => executor.execute(&sql).materialize(job),
        }
    }

    fn into_raster_data(self, job: &Job) -> Fallible<RasterData> {
        match self {
            Data::Raster(r) => Ok(r),
            Data::Stream(mut s) => Ok(RasterData::from_raster(s.materialize(job)?)),
            Data::Sql(sql, executor) => {
                Ok(RasterData::from_raster(executor.execute(&sql).materialize(job)?))
            }
        }
    }

    /// `calculate`/`selectColumns`/`limit` are the three operations the
    /// stream layer itself supports (§4.7); falling back off SQL lands on
    /// a transformer, not a full raster materialization.
    pub fn calculate(self, targets: Vec<(Column, Expression)>) -> Data {
        match self {
            Data::Raster(r) => Data::Raster(r.calculate(targets)),
            Data::Stream(s) => Data::Stream(Box::new(CalculateTransformer::new(s, targets))),
            Data::Sql(sql, executor) => match sql.calculate(&targets) {
                Some(lowered) => Data::Sql(lowered, executor),
                None => {
                    let stream = executor.execute(&sql);
                    Data::Stream(Box::new(CalculateTransformer::new(stream, targets)))
                }
            },
        }
    }

    pub fn select_columns(self, wanted: Vec<Column>) -> Data {
        match self {
            Data::Raster(r) => Data::Raster(r.select_columns(wanted)),
            Data::Stream(s) => Data::Stream(Box::new(ColumnsTransformer::new(s, wanted))),
            Data::Sql(sql, executor) => match sql.select_columns(&wanted) {
                Some(lowered) => Data::Sql(lowered, executor),
                None => {
                    let stream = executor.execute(&sql);
                    Data::Stream(Box::new(ColumnsTransformer::new(stream, wanted)))
                }
            },
        }
    }

    pub fn limit(self, n: usize) -> Data {
        match self {
            Data::Raster(r) => Data::Raster(r.limit(n)),
            Data::Stream(s) => Data::Stream(Box::new(LimitTransformer::new(s, n))),
            Data::Sql(sql, executor) => match sql.limit(n) {
                Some(lowered) => Data::Sql(lowered, executor),
                None => {
                    let stream = executor.execute(&sql);
                    Data::Stream(Box::new(LimitTransformer::new(stream, n)))
                }
            },
        }
    }

    /// Not supported by the stream transformer set; a `Stream` or
    /// unlowerable `Sql` backend first materializes to a raster.
    pub fn filter(self, cond: Expression, job: &Job) -> Fallible<Data> {
        if let Data::Sql(sql, executor) = self {
            if let Some(lowered) = sql.filter(&cond) {
                return Ok(Data::Sql(lowered, executor));
            }
            log::debug!("filter: condition not representable in SQL, materializing");
            let raster_data = Data::Sql(sql, executor).into_raster_data(job)?;
            return Ok(Data::Raster(raster_data.filter(&cond)));
        }
        let raster_data = self.into_raster_data(job)?;
        Ok(Data::Raster(raster_data.filter(&cond)))
    }

    pub fn distinct(self, job: &Job) -> Fallible<Data> {
        if let Data::Sql(sql, executor) = self {
            if let Some(lowered) = sql.distinct() {
                return Ok(Data::Sql(lowered, executor));
            }
            log::debug!("distinct: not representable in SQL, materializing");
            let raster_data = Data::Sql(sql, executor).into_raster_data(job)?;
            return Ok(Data::Raster(raster_data.distinct()));
        }
        let raster_data = self.into_raster_data(job)?;
        Ok(Data::Raster(raster_data.distinct()))
    }

    pub fn sort(self, keys: Vec<SortKey>, job: &Job) -> Fallible<Data> {
        if let Data::Sql(sql, executor) = self {
            if let Some(lowered) = sql.sort(&keys) {
                return Ok(Data::Sql(lowered, executor));
            }
            log::debug!("sort: one or more keys not representable in SQL, materializing");
            let raster_data = Data::Sql(sql, executor).into_raster_data(job)?;
            return Ok(Data::Raster(raster_data.sort(&keys)));
        }
        let raster_data = self.into_raster_data(job)?;
        Ok(Data::Raster(raster_data.sort(&keys)))
    }

    pub fn random(self, n: usize, job: &Job) -> Fallible<Data> {
        if let Data::Sql(sql, executor) = self {
            if let Some(lowered) = sql.random(n) {
                return Ok(Data::Sql(lowered, executor));
            }
            log::debug!("random: not representable in SQL, materializing");
            let raster_data = Data::Sql(sql, executor).into_raster_data(job)?;
            return Ok(Data::Raster(raster_data.random(n)));
        }
        let raster_data = self.into_raster_data(job)?;
        Ok(Data::Raster(raster_data.random(n)))
    }

    /// Never lowered in SQL (§4.8): always materializes.
    pub fn transpose(self, job: &Job) -> Fallible<Data> {
        Ok(Data::Raster(self.into_raster_data(job)?.transpose()))
    }

    pub fn aggregate(
        self,
        groups: Vec<(Column, Expression)>,
        values: Vec<Aggregation>,
        job: &Job,
    ) -> Fallible<Data> {
        if let Data::Sql(sql, executor) = self {
            if let Some(lowered) = sql.aggregate(&groups, &values) {
                return Ok(Data::Sql(lowered, executor));
            }
            log::debug!("aggregate: one or more reduces not representable in SQL, materializing");
            let raster_data = Data::Sql(sql, executor).into_raster_data(job)?;
            return Ok(Data::Raster(raster_data.aggregate(groups, values)));
        }
        let raster_data = self.into_raster_data(job)?;
        Ok(Data::Raster(raster_data.aggregate(groups, values)))
    }

    /// Never lowered in SQL: always materializes.
    pub fn pivot(
        self,
        horizontal: Vec<Column>,
        vertical: Vec<Column>,
        values: Vec<Column>,
        job: &Job,
    ) -> Fallible<Data> {
        let raster_data = self.into_raster_data(job)?;
        Ok(Data::Raster(raster_data.pivot(horizontal, vertical, values)))
    }

    pub fn join(self, other: Data, left_key: Column, right_key: Column, how: JoinKind, job: &Job) -> Fallible<Data> {
        let left = self.into_raster_data(job)?;
        let right = other.into_raster_data(job)?;
        Ok(Data::Raster(left.join(&right, &left_key, &right_key, how)))
    }

    pub fn unique(self, expr: &Expression, job: &Job) -> Fallible<Vec<sheetql_parser::Value>> {
        if let Data::Sql(sql, executor) = &self {
            if let Some(lowered) = sql.unique(expr) {
                let raster = executor.execute(&lowered).materialize(job)?;
                return Ok(raster.rows().iter().map(|r| r[0].clone()).collect());
            }
        }
        let raster_data = self.into_raster_data(job)?;
        Ok(raster_data.unique(expr))
    }
}
