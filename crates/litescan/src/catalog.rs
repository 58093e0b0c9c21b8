//! The schema catalog: a one-shot read of the B-tree rooted at page 1.
//!
//! Built eagerly at open and immutable afterwards. Tables and indexes keep
//! file order; indexes reference their table by name, so there are no
//! reference cycles to manage.

use std::sync::Arc;

use litescan_btree::{BtreeCursor, CellErrorStrategy, LeafEntry, TreeKind};
use litescan_error::{Result, ScanError};
use litescan_pager::Pager;
use litescan_sql::{parse_create_index, parse_create_table};
use litescan_types::{CancelToken, PageNumber, Value};
use tracing::{debug, warn};

use crate::index::Index;
use crate::table::Table;

/// The reserved name of the schema table itself.
pub const SCHEMA_TABLE_NAME: &str = "sqlite_master";

/// Classification of a schema row by its `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaObjectType {
    Table,
    Index,
    View,
    Trigger,
}

impl SchemaObjectType {
    fn from_type_column(s: &str) -> Option<Self> {
        match s {
            "table" => Some(Self::Table),
            "index" => Some(Self::Index),
            "view" => Some(Self::View),
            "trigger" => Some(Self::Trigger),
            _ => None,
        }
    }
}

/// One row of the schema table, columns in file order:
/// (type, name, tbl_name, rootpage, sql).
#[derive(Debug, Clone)]
pub struct SchemaRecord {
    pub object_type: SchemaObjectType,
    pub name: String,
    pub tbl_name: String,
    /// Root page of the object's tree; 0 for views and triggers.
    pub root_page: u32,
    pub sql: Option<String>,
}

/// All schema objects plus the constructed table and index handles.
#[derive(Debug)]
pub struct Catalog {
    objects: Vec<SchemaRecord>,
    tables: Vec<Arc<Table>>,
}

impl Catalog {
    /// Read the root-page-1 tree and build every handle. Schema rows are
    /// correctness-critical, so the traversal uses the fail strategy.
    pub async fn load(pager: Arc<Pager>, cancel: &CancelToken) -> Result<Self> {
        let cursor = BtreeCursor::new(Arc::clone(&pager), PageNumber::ONE, TreeKind::Table)
            .with_strategy(CellErrorStrategy::Fail);
        let entries = cursor.traverse(cancel).await?;

        let mut objects = Vec::with_capacity(entries.len());
        for entry in entries {
            match schema_record(&entry) {
                Some(record) => objects.push(record),
                None => warn!(
                    page = entry.page.get(),
                    rowid = entry.rowid,
                    "schema row does not look like a schema record; ignoring"
                ),
            }
        }

        // Tables first, then indexes, then a single attachment pass; an
        // index can precede its table in file order.
        let mut tables = Vec::new();
        for obj in &objects {
            if obj.object_type != SchemaObjectType::Table || obj.name == SCHEMA_TABLE_NAME {
                continue;
            }
            let Some(root) = PageNumber::new(obj.root_page) else {
                warn!(table = %obj.name, "table with zero root page; ignoring");
                continue;
            };
            let sql = obj.sql.clone().unwrap_or_default();
            let columns = parse_create_table(&obj.name, &sql)?;
            tables.push(Table::new(
                Arc::clone(&pager),
                obj.name.clone(),
                root,
                columns,
                sql,
            ));
        }

        let mut indexes = Vec::new();
        for obj in &objects {
            if obj.object_type != SchemaObjectType::Index {
                continue;
            }
            let Some(root) = PageNumber::new(obj.root_page) else {
                warn!(index = %obj.name, "index with zero root page; ignoring");
                continue;
            };
            // Auto-indexes (UNIQUE constraints) carry no SQL; they stay
            // searchable by hand but the planner never picks them.
            let columns = match obj.sql.as_deref() {
                Some(sql) => match parse_create_index(&obj.name, sql) {
                    Ok(def) => def.columns,
                    Err(err) => {
                        warn!(index = %obj.name, error = %err, "unparseable CREATE INDEX");
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };
            indexes.push(Index::new(
                Arc::clone(&pager),
                obj.name.clone(),
                obj.tbl_name.clone(),
                root,
                columns,
            ));
        }

        let tables = tables
            .into_iter()
            .map(|table| {
                let attached: Vec<Index> = indexes
                    .iter()
                    .filter(|idx| idx.table_name() == table.name())
                    .cloned()
                    .collect();
                Arc::new(table.with_indexes(attached))
            })
            .collect::<Vec<_>>();

        debug!(
            objects = objects.len(),
            tables = tables.len(),
            indexes = indexes.len(),
            "catalog loaded"
        );
        Ok(Self { objects, tables })
    }

    /// Every schema row, file order.
    pub fn objects(&self) -> &[SchemaRecord] {
        &self.objects
    }

    /// User tables in file order (`sqlite_master` excluded).
    pub fn tables(&self) -> &[Arc<Table>] {
        &self.tables
    }

    /// Look a table up by name, ASCII case-insensitively.
    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.tables
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| ScanError::NoSuchTable {
                name: name.to_owned(),
            })
    }
}

/// Interpret one leaf entry of the page-1 tree as a schema record.
fn schema_record(entry: &LeafEntry) -> Option<SchemaRecord> {
    let values = &entry.record.values;
    if values.len() < 5 {
        return None;
    }
    let object_type = SchemaObjectType::from_type_column(values[0].as_text()?)?;
    let name = values[1].as_text()?.to_owned();
    let tbl_name = values[2].as_text()?.to_owned();
    // The rootpage column is an integer of its declared serial width (up
    // to four bytes in practice); views and triggers store NULL or 0.
    let root_page = match &values[3] {
        Value::Null => 0,
        other => u32::try_from(other.as_integer()?).ok()?,
    };
    let sql = match &values[4] {
        Value::Null => None,
        Value::Text(s) => Some(s.clone()),
        _ => None,
    };
    Some(SchemaRecord {
        object_type,
        name,
        tbl_name,
        root_page,
        sql,
    })
}
