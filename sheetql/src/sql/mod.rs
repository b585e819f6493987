//! The SQL backend: translates pipeline operations into SQL strings
//! against a [`Dialect`], falling back to streaming/raster evaluation
//! wherever a translation has no safe lowering (see §4.8).

pub mod data;
pub mod dialect;

pub use data::{SortForce, SortKey, SqlData};
pub use dialect::{Dialect, GenericDialect, SqliteDialect};
