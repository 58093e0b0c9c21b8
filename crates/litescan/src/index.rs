//! Index handles: a typed view over an index B-tree.

use std::sync::Arc;

use litescan_btree::{BtreeCursor, SearchKey, TreeKind};
use litescan_error::Result;
use litescan_pager::Pager;
use litescan_types::{CancelToken, PageNumber, Value};
use tracing::warn;

/// One index hit: the user's key columns and the table rowid they point at.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub key_values: Vec<Value>,
    pub rowid: i64,
}

/// An immutable handle over one index. References its table by name only.
#[derive(Debug, Clone)]
pub struct Index {
    pager: Arc<Pager>,
    name: String,
    table_name: String,
    root_page: PageNumber,
    /// Column names parsed from the CREATE INDEX text; empty for
    /// auto-indexes whose schema row has no SQL.
    columns: Vec<String>,
}

impl Index {
    pub(crate) fn new(
        pager: Arc<Pager>,
        name: String,
        table_name: String,
        root_page: PageNumber,
        columns: Vec<String>,
    ) -> Self {
        Self {
            pager,
            name,
            table_name,
            root_page,
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub const fn root_page(&self) -> PageNumber {
        self.root_page
    }

    pub fn indexed_columns(&self) -> &[String] {
        &self.columns
    }

    /// The first indexed column, the one point lookups exploit.
    pub fn leading_column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    fn cursor(&self) -> BtreeCursor {
        BtreeCursor::new(Arc::clone(&self.pager), self.root_page, TreeKind::Index)
    }

    /// Number of index entries.
    pub async fn count(&self, cancel: &CancelToken) -> Result<u64> {
        self.cursor().count_entries(cancel).await
    }

    /// Equality search on the leading column. Each hit's rowid is the
    /// record's last value, decoded per its declared serial type and
    /// promoted to an integer; entries whose trailing value cannot be an
    /// integer are dropped.
    pub async fn search_by_key(&self, key: &str, cancel: &CancelToken) -> Result<Vec<IndexEntry>> {
        let hits = self
            .cursor()
            .search(&SearchKey::Bytes(key.as_bytes().to_vec()), cancel)
            .await?;

        let mut entries = Vec::with_capacity(hits.len());
        for hit in hits {
            let mut values = hit.record.values;
            let Some(trailing) = values.pop() else {
                warn!(index = %self.name, "index record with no values; dropping");
                continue;
            };
            let Some(rowid) = trailing.promote_to_integer() else {
                warn!(
                    index = %self.name,
                    trailing = %trailing,
                    "index record trailing value is not a rowid; dropping"
                );
                continue;
            };
            entries.push(IndexEntry {
                key_values: values,
                rowid,
            });
        }
        Ok(entries)
    }
}
