//! The top-level database facade: open builds the pager and eagerly loads
//! the catalog; close is drop. No state mutates during queries, so
//! repeating an operation repeats its output.

use std::path::Path;
use std::sync::Arc;

use litescan_error::{Result, ScanError};
use litescan_pager::{Pager, PagerConfig};
use litescan_sql::Statement;
use litescan_types::{CancelToken, DatabaseHeader};

use crate::catalog::{Catalog, SCHEMA_TABLE_NAME};
use crate::exec::{execute_select, QueryOptions};
use crate::table::Table;

/// A read-only SQLite database.
#[derive(Debug)]
pub struct Database {
    pager: Arc<Pager>,
    catalog: Catalog,
    options: QueryOptions,
}

impl Database {
    /// Open `path` and load the schema catalog.
    pub async fn open(path: impl AsRef<Path>, config: PagerConfig) -> Result<Self> {
        let pager = Arc::new(Pager::open(path, config)?);
        let catalog = Catalog::load(Arc::clone(&pager), &CancelToken::new()).await?;
        Ok(Self {
            pager,
            catalog,
            options: QueryOptions::default(),
        })
    }

    #[must_use]
    pub fn with_query_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn page_size(&self) -> usize {
        self.pager.page_size()
    }

    pub fn header(&self) -> &DatabaseHeader {
        self.pager.header()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.catalog.table(name)
    }

    /// Table names as `.tables` reports them: the schema table first, then
    /// user tables in catalog order.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names = vec![SCHEMA_TABLE_NAME];
        names.extend(self.catalog.tables().iter().map(|t| t.name()));
        names
    }

    /// Number of user tables (the schema table excluded).
    pub fn user_table_count(&self) -> usize {
        self.catalog.tables().len()
    }

    /// Execute a parsed statement. Only SELECT runs; the write-path
    /// variants are refused.
    pub async fn execute(&self, stmt: &Statement, cancel: &CancelToken) -> Result<Vec<String>> {
        match stmt {
            Statement::Select(select) => {
                execute_select(&self.catalog, select, &self.options, cancel).await
            }
            other => Err(ScanError::UnsupportedStatement {
                detail: format!("{} statements are not supported", other.kind()),
            }),
        }
    }
}
