//! litescan: a read-only reader for the SQLite v3 on-disk format.
//!
//! The storage engine stack, bottom up: a pager with bounded concurrent
//! positioned reads, B-tree cursors over table and index trees, the
//! varint/serial-type/record codecs, a schema catalog built once at open,
//! typed table and index handles, and a planner/executor pair that picks
//! between a table scan and an index-driven point lookup.

pub mod catalog;
pub mod db;
pub mod exec;
pub mod index;
pub mod plan;
pub mod table;

pub use catalog::{Catalog, SchemaObjectType, SchemaRecord, SCHEMA_TABLE_NAME};
pub use db::Database;
pub use exec::{eval_predicate, execute_select, QueryOptions};
pub use index::{Index, IndexEntry};
pub use plan::{plan_select, QueryPlan};
pub use table::{Row, Table};

pub use litescan_error::{ErrorCode, Result, ScanError};
pub use litescan_pager::{Pager, PagerConfig};
pub use litescan_sql::{parse_statement, Statement};
pub use litescan_types::{CancelToken, Value};
