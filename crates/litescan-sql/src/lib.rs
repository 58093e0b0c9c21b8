//! SQL front end for the litescan reader: a tokenizer, a parser for the
//! supported SELECT subset (plus recognition of the write statements the
//! executor refuses), and best-effort DDL parsing for the schema catalog.

pub mod ast;
pub mod ddl;
pub mod parse;
pub mod token;

pub use ast::{CompareOp, Expr, Literal, Projection, SelectStatement, Statement};
pub use ddl::{parse_create_index, parse_create_table, ColumnDef, IndexDef};
pub use parse::parse_statement;
