//! SELECT execution: table scans, index-driven point lookups with a
//! bounded parallel row fetch, string-wise predicate evaluation, and
//! projection rendering.

use std::sync::Arc;
use std::time::Duration;

use litescan_error::{Result, ScanError};
use litescan_sql::{CompareOp, Expr, Projection, SelectStatement};
use litescan_types::{CancelToken, Value};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::index::IndexEntry;
use crate::plan::{plan_select, QueryPlan};
use crate::table::{Row, Table};

/// Per-query tunables.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Deadline for the whole index-lookup fan-out; on expiry, remaining
    /// fetches are cancelled and the rows already fetched are kept.
    pub fanout_timeout: Duration,
    /// Deadline for one rowid fetch within the fan-out.
    pub fetch_timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            fanout_timeout: Duration::from_secs(3),
            fetch_timeout: Duration::from_secs(3),
        }
    }
}

impl QueryOptions {
    #[must_use]
    pub fn with_fanout_timeout(mut self, timeout: Duration) -> Self {
        self.fanout_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Execute a SELECT against the catalog, producing rendered output lines.
pub async fn execute_select(
    catalog: &Catalog,
    stmt: &SelectStatement,
    options: &QueryOptions,
    cancel: &CancelToken,
) -> Result<Vec<String>> {
    let table = catalog.table(&stmt.table)?;

    if matches!(stmt.projection, Projection::CountStar) {
        // LIMIT elides the single aggregate row too.
        if stmt.limit == Some(0) {
            return Ok(Vec::new());
        }
        let count = match &stmt.where_clause {
            None => table.count(cancel).await?,
            Some(expr) => {
                let rows = fetch_rows(&table, stmt, options, cancel).await?;
                let mut matched = 0u64;
                for row in &rows {
                    if eval_predicate(expr, row, &table)? {
                        matched += 1;
                    }
                }
                matched
            }
        };
        return Ok(vec![count.to_string()]);
    }

    let projection = resolve_projection(&table, &stmt.projection)?;
    let rows = fetch_rows(&table, stmt, options, cancel).await?;

    let mut lines = Vec::new();
    for row in &rows {
        if let Some(limit) = stmt.limit {
            if lines.len() as u64 >= limit {
                break;
            }
        }
        if let Some(expr) = &stmt.where_clause {
            if !eval_predicate(expr, row, &table)? {
                continue;
            }
        }
        lines.push(render_row(row, &projection));
    }
    Ok(lines)
}

/// Produce the candidate rows for a SELECT according to its plan. Index
/// lookups return only key-matching rows (the full WHERE tree is still
/// applied afterwards as the residual predicate); table scans return
/// everything.
async fn fetch_rows(
    table: &Arc<Table>,
    stmt: &SelectStatement,
    options: &QueryOptions,
    cancel: &CancelToken,
) -> Result<Vec<Row>> {
    match plan_select(table, stmt.where_clause.as_ref()) {
        QueryPlan::TableScan => table.rows(cancel).await,
        QueryPlan::IndexLookup { index, key } => {
            let entries = index.search_by_key(&key, cancel).await?;
            debug!(
                index = index.name(),
                key = %key,
                hits = entries.len(),
                "index lookup"
            );
            Ok(fetch_by_rowids(table, &entries, options, cancel).await)
        }
    }
}

/// Fetch one row per index entry in parallel. Concurrency is bounded
/// transitively by the pager's permit set; results are re-ordered to the
/// index's emission order. Individual failures and missing rows are
/// dropped silently (a stale index, or a skipped cell), and the fan-out
/// deadline cancels whatever is still in flight while keeping the rows
/// already fetched.
async fn fetch_by_rowids(
    table: &Arc<Table>,
    entries: &[IndexEntry],
    options: &QueryOptions,
    cancel: &CancelToken,
) -> Vec<Row> {
    let fanout_cancel = cancel.child();
    let mut set: JoinSet<(usize, Option<Row>)> = JoinSet::new();
    for (position, entry) in entries.iter().enumerate() {
        let table = Arc::clone(table);
        let token = fanout_cancel.clone();
        let fetch_timeout = options.fetch_timeout;
        #[allow(clippy::cast_sign_loss)]
        let rowid = entry.rowid as u64;
        set.spawn(async move {
            let fetched =
                tokio::time::timeout(fetch_timeout, table.get_by_rowid(rowid, &token)).await;
            let row = match fetched {
                Ok(Ok(row)) => row,
                Ok(Err(err)) => {
                    debug!(rowid, error = %err, "dropping failed row fetch");
                    None
                }
                Err(_) => {
                    debug!(rowid, "dropping timed-out row fetch");
                    None
                }
            };
            (position, row)
        });
    }

    let mut slots: Vec<Option<Row>> = vec![None; entries.len()];
    let deadline = tokio::time::timeout(options.fanout_timeout, async {
        while let Some(joined) = set.join_next().await {
            if let Ok((position, row)) = joined {
                slots[position] = row;
            }
        }
    })
    .await;

    if deadline.is_err() {
        warn!(
            timeout_ms = options.fanout_timeout.as_millis() as u64,
            "index lookup fan-out timed out; returning partial results"
        );
        fanout_cancel.cancel();
        set.abort_all();
        // Harvest fetches that completed before the abort landed.
        while let Some(joined) = set.join_next().await {
            if let Ok((position, row)) = joined {
                slots[position] = row;
            }
        }
    }

    slots.into_iter().flatten().collect()
}

/// Column indices to emit, in output order.
fn resolve_projection(table: &Table, projection: &Projection) -> Result<Vec<usize>> {
    match projection {
        Projection::Star => Ok((0..table.schema().len()).collect()),
        Projection::Columns(names) => names
            .iter()
            .map(|name| table.resolve_column(name))
            .collect(),
        Projection::CountStar => Err(ScanError::internal(
            "COUNT(*) does not project columns",
        )),
    }
}

fn render_row(row: &Row, projection: &[usize]) -> String {
    let rendered: Vec<String> = projection
        .iter()
        .map(|&idx| row.get(idx).unwrap_or(&Value::Null).render())
        .collect();
    rendered.join("|")
}

/// Evaluate a WHERE tree against one row. All comparisons are string-wise
/// on rendered values; AND short-circuits on false, OR on true.
pub fn eval_predicate(expr: &Expr, row: &Row, table: &Table) -> Result<bool> {
    match expr {
        Expr::Comparison {
            column,
            op,
            literal,
        } => {
            let idx = table.resolve_column(column)?;
            let lhs = row.get(idx).unwrap_or(&Value::Null).render();
            let rhs = literal.render();
            Ok(compare_strings(&lhs, rhs, *op))
        }
        Expr::And(left, right) => {
            if !eval_predicate(left, row, table)? {
                return Ok(false);
            }
            eval_predicate(right, row, table)
        }
        Expr::Or(left, right) => {
            if eval_predicate(left, row, table)? {
                return Ok(true);
            }
            eval_predicate(right, row, table)
        }
    }
}

fn compare_strings(lhs: &str, rhs: &str, op: CompareOp) -> bool {
    match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::NotEq => lhs != rhs,
        CompareOp::Lt => lhs < rhs,
        CompareOp::LtEq => lhs <= rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::GtEq => lhs >= rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_comparison_table() {
        assert!(compare_strings("Red", "Red", CompareOp::Eq));
        assert!(!compare_strings("Red", "Yellow", CompareOp::Eq));
        assert!(compare_strings("Red", "Yellow", CompareOp::NotEq));
        assert!(compare_strings("Red", "Yellow", CompareOp::Lt));
        assert!(compare_strings("b", "ab", CompareOp::Gt));
        assert!(compare_strings("10", "9", CompareOp::Lt)); // string-wise
        assert!(compare_strings("abc", "abc", CompareOp::LtEq));
        assert!(compare_strings("abc", "abc", CompareOp::GtEq));
    }
}
