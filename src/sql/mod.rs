//! SQL dialect capability and dialect-aware column identifiers.
//!
//! All SQL built by this crate is "generic": ANSI style, with identifiers
//! quoted through the target [`Dialect`] and a small set of portable type
//! names (`DOUBLE`, `VARCHAR`). A dialect translates that text into what its
//! engine accepts and knows how to materialize a query as a table.

pub mod column;
pub mod dialect;
pub mod errors;

pub use column::ColumnIdentifier;
pub use dialect::{ClickHouseDialect, Dialect, SqliteDialect};
pub use errors::DialectError;
