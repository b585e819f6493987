//! # sheetql
//!
//! Spreadsheet-like data-transformation engine. A pipeline is a sequence of
//! steps over a [`data::Data`] handle; each step evaluates the same
//! [`sheetql_parser::Expression`] tree regardless of whether the handle
//! is currently backed by an in-memory [`raster::Raster`], a pull-based
//! [`stream::Stream`], or a translated [`sql::SqlData`] query.
//!
//! Two speeds of the same computation are supported: a small in-memory
//! raster for interactive design, and a streaming/SQL-pushed path for the
//! full dataset. See `SPEC_FULL.md` §3–§5 for the architecture this crate
//! implements.

pub mod aggregation;
pub mod data;
pub mod error;
pub mod future;
pub mod job;
pub mod lazy;
pub mod raster;
pub mod raster_data;
pub mod sql;
pub mod stream;

#[cfg(feature = "cli")]
pub mod cli;

pub use aggregation::Aggregation;
pub use data::{Data, SqlExecutor};
pub use error::{Error, Fallible, JobError, Reason};
pub use future::{Batch, Callback, Future, Satisfy};
pub use job::Job;
pub use raster::Raster;
pub use raster_data::{JoinKind, RasterData};
pub use sql::{Dialect, GenericDialect, SortForce, SortKey, SqlData, SqliteDialect};
pub use stream::{Batch as StreamBatch, CalculateTransformer, ColumnsTransformer, LimitTransformer, Stream, VecStream};

pub use sheetql_parser::{
    BinaryOp, Column, Expression, Function, Locale, ParseError, ParseResult, Value,
};
