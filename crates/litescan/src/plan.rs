//! Query planning. One rule: an AND-conjunct `col = literal` whose column
//! is the leading column of some index turns the query into an index
//! lookup; everything else is a table scan.

use litescan_sql::{CompareOp, Expr};
use tracing::debug;

use crate::index::Index;
use crate::table::Table;

/// The chosen access path for a SELECT.
#[derive(Debug, Clone)]
pub enum QueryPlan {
    /// Iterate every row and filter.
    TableScan,
    /// Probe `index` for `key`, fetch rows by rowid, then filter.
    IndexLookup { index: Index, key: String },
}

impl QueryPlan {
    pub const fn is_index_lookup(&self) -> bool {
        matches!(self, Self::IndexLookup { .. })
    }
}

/// Pick the plan for `table` under the optional WHERE tree.
pub fn plan_select(table: &Table, where_clause: Option<&Expr>) -> QueryPlan {
    let Some(expr) = where_clause else {
        return QueryPlan::TableScan;
    };

    let mut conjuncts = Vec::new();
    collect_conjuncts(expr, &mut conjuncts);

    for conjunct in conjuncts {
        let Expr::Comparison {
            column,
            op: CompareOp::Eq,
            literal,
        } = conjunct
        else {
            continue;
        };
        for index in table.indexes() {
            if index
                .leading_column()
                .is_some_and(|leading| leading.eq_ignore_ascii_case(column))
            {
                debug!(
                    table = table.name(),
                    index = index.name(),
                    column,
                    "planning index lookup"
                );
                return QueryPlan::IndexLookup {
                    index: index.clone(),
                    key: literal.render().to_owned(),
                };
            }
        }
    }
    QueryPlan::TableScan
}

/// Flatten the AND spine; an OR subtree is one opaque conjunct.
fn collect_conjuncts<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::And(left, right) => {
            collect_conjuncts(left, out);
            collect_conjuncts(right, out);
        }
        other => out.push(other),
    }
}
