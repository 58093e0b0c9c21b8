//! Table handles: a typed view over a table B-tree.

use std::sync::Arc;

use litescan_btree::{BtreeCursor, LeafEntry, SearchKey, TreeKind};
use litescan_error::{Result, ScanError};
use litescan_pager::Pager;
use litescan_sql::ColumnDef;
use litescan_types::{CancelToken, PageNumber, Value};

use crate::index::Index;

/// One materialized row: values in schema order, rowid alias resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub rowid: i64,
    values: Vec<Value>,
}

impl Row {
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// An immutable handle over one table. Created by the catalog at open,
/// shared read-only for the life of the reader.
#[derive(Debug, Clone)]
pub struct Table {
    pager: Arc<Pager>,
    name: String,
    root_page: PageNumber,
    columns: Vec<ColumnDef>,
    indexes: Vec<Index>,
    sql: String,
}

impl Table {
    pub(crate) fn new(
        pager: Arc<Pager>,
        name: String,
        root_page: PageNumber,
        columns: Vec<ColumnDef>,
        sql: String,
    ) -> Self {
        Self {
            pager,
            name,
            root_page,
            columns,
            indexes: Vec::new(),
            sql,
        }
    }

    pub(crate) fn with_indexes(mut self, indexes: Vec<Index>) -> Self {
        self.indexes = indexes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn root_page(&self) -> PageNumber {
        self.root_page
    }

    /// Columns parsed from the CREATE TABLE text, in declaration order.
    pub fn schema(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Indexes attached to this table by the catalog.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Resolve a column name, ASCII case-insensitively. Two columns that
    /// fold to the same name make the reference ambiguous.
    pub fn resolve_column(&self, name: &str) -> Result<usize> {
        let mut matches = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, col)| col.name.eq_ignore_ascii_case(name));
        let Some((idx, _)) = matches.next() else {
            return Err(ScanError::NoSuchColumn {
                name: name.to_owned(),
            });
        };
        if matches.next().is_some() {
            return Err(ScanError::AmbiguousColumn {
                name: name.to_owned(),
            });
        }
        Ok(idx)
    }

    fn cursor(&self) -> BtreeCursor {
        BtreeCursor::new(Arc::clone(&self.pager), self.root_page, TreeKind::Table)
    }

    /// Number of rows: the total leaf-cell count, summed without parsing
    /// any cell.
    pub async fn count(&self, cancel: &CancelToken) -> Result<u64> {
        self.cursor().count_entries(cancel).await
    }

    /// Every row in rowid order.
    pub async fn rows(&self, cancel: &CancelToken) -> Result<Vec<Row>> {
        let entries = self.cursor().traverse(cancel).await?;
        Ok(entries
            .into_iter()
            .map(|entry| self.materialize(entry))
            .collect())
    }

    /// Point lookup by rowid; `Ok(None)` when the tree holds no such row.
    pub async fn get_by_rowid(&self, rowid: u64, cancel: &CancelToken) -> Result<Option<Row>> {
        let mut hits = self
            .cursor()
            .search(&SearchKey::Rowid(rowid), cancel)
            .await?;
        Ok(if hits.is_empty() {
            None
        } else {
            Some(self.materialize(hits.remove(0)))
        })
    }

    /// Build a row in schema order. A NULL stored in the INTEGER PRIMARY
    /// KEY column is the rowid alias and materializes as the cell's rowid.
    #[allow(clippy::cast_possible_wrap)]
    fn materialize(&self, entry: LeafEntry) -> Row {
        let rowid = entry.rowid.unwrap_or_default() as i64;
        let mut record_values = entry.record.values;

        if self.columns.is_empty() {
            // No parsed schema; expose the record as stored.
            return Row {
                rowid,
                values: record_values,
            };
        }

        let mut values = Vec::with_capacity(self.columns.len());
        for (idx, column) in self.columns.iter().enumerate() {
            let stored = if idx < record_values.len() {
                std::mem::replace(&mut record_values[idx], Value::Null)
            } else {
                Value::Null
            };
            if stored.is_null() && column.is_integer_primary_key {
                values.push(Value::Integer(rowid));
            } else {
                values.push(stored);
            }
        }
        Row { rowid, values }
    }
}
