//! B-tree traversal and equality point search.
//!
//! A cursor is parameterized by the pager, a root page, the tree kind, and
//! a per-cell error strategy fixed at construction. Traverse-all yields
//! leaf cells in key order; point search descends once to the candidate
//! leaf and emits equal-key cells. Equality only: there is no
//! backtracking, and range scans are a full traversal plus a filter at the
//! caller.

use std::cmp::Ordering;
use std::sync::Arc;

use litescan_error::{Result, ScanError};
use litescan_pager::Pager;
use litescan_types::record::{parse_record, Record};
use litescan_types::{CancelToken, PageNumber};
use tracing::{debug, warn};

use crate::cell::{cell_pointers, header_offset_for_page, Cell, PageHeader, PageKind};
use crate::compare_key_bytes;

/// Which of the two B-tree families a cursor walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    /// Rowid-keyed table tree (page kinds 0x05 / 0x0D).
    Table,
    /// Record-keyed index tree (page kinds 0x02 / 0x0A).
    Index,
}

impl TreeKind {
    const fn accepts(self, kind: PageKind) -> bool {
        match self {
            Self::Table => kind.is_table(),
            Self::Index => kind.is_index(),
        }
    }
}

/// What to do when one cell fails to parse during a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellErrorStrategy {
    /// Log and continue; the default, for robustness on large trees.
    #[default]
    Skip,
    /// Abort the traversal with the cell's error.
    Fail,
}

/// A search key, matching the cursor's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// Table trees compare rowids as unsigned integers.
    Rowid(u64),
    /// Index trees compare the record's first value byte-wise.
    Bytes(Vec<u8>),
}

/// One emitted leaf cell: the rowid (table trees only) and the decoded
/// record payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafEntry {
    pub page: PageNumber,
    pub rowid: Option<u64>,
    pub record: Record,
}

/// A read cursor over one B-tree.
#[derive(Debug, Clone)]
pub struct BtreeCursor {
    pager: Arc<Pager>,
    root: PageNumber,
    kind: TreeKind,
    strategy: CellErrorStrategy,
}

impl BtreeCursor {
    pub fn new(pager: Arc<Pager>, root: PageNumber, kind: TreeKind) -> Self {
        Self {
            pager,
            root,
            kind,
            strategy: CellErrorStrategy::default(),
        }
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: CellErrorStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub const fn root(&self) -> PageNumber {
        self.root
    }

    /// Visit every leaf cell in key order.
    pub async fn traverse(&self, cancel: &CancelToken) -> Result<Vec<LeafEntry>> {
        let mut out = Vec::new();
        // Explicit stack; children are pushed in reverse so the leftmost
        // child is processed first.
        let mut stack = vec![self.root];
        while let Some(page_no) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let page = self.pager.read_page(page_no, cancel).await?;
            let bytes = page.as_bytes();
            let (header, pointers) = self.read_page_structure(bytes, page_no)?;

            if header.kind.is_leaf() {
                for (idx, &ptr) in pointers.iter().enumerate() {
                    match self.parse_leaf_entry(bytes, ptr, header.kind, page_no) {
                        Ok(entry) => out.push(entry),
                        Err(err) => self.note_cell_error(err, page_no, idx)?,
                    }
                }
            } else {
                let right = header
                    .right_child
                    .expect("interior header carries rightmost child");
                let mut children = Vec::with_capacity(pointers.len() + 1);
                for (idx, &ptr) in pointers.iter().enumerate() {
                    match self.checked_cell(bytes, ptr, header.kind, page_no) {
                        Ok(cell) => children.push(
                            cell.left_child()
                                .expect("interior cell carries left child"),
                        ),
                        Err(err) => self.note_cell_error(err, page_no, idx)?,
                    }
                }
                children.push(right);
                for child in children.into_iter().rev() {
                    stack.push(child);
                }
            }
        }
        Ok(out)
    }

    /// Total leaf cell count, summing `cell_count` per leaf page without
    /// parsing any cell.
    pub async fn count_entries(&self, cancel: &CancelToken) -> Result<u64> {
        let mut count: u64 = 0;
        let mut stack = vec![self.root];
        while let Some(page_no) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let page = self.pager.read_page(page_no, cancel).await?;
            let bytes = page.as_bytes();
            let (header, pointers) = self.read_page_structure(bytes, page_no)?;

            if header.kind.is_leaf() {
                count += u64::from(header.cell_count);
            } else {
                for (idx, &ptr) in pointers.iter().enumerate() {
                    match self.checked_cell(bytes, ptr, header.kind, page_no) {
                        Ok(cell) => {
                            stack.push(cell.left_child().expect("interior cell has child"));
                        }
                        Err(err) => self.note_cell_error(err, page_no, idx)?,
                    }
                }
                stack.push(header.right_child.expect("interior header has right child"));
            }
        }
        Ok(count)
    }

    /// Equality point search: descend to the candidate leaf and emit every
    /// cell whose key equals `key`.
    pub async fn search(&self, key: &SearchKey, cancel: &CancelToken) -> Result<Vec<LeafEntry>> {
        let mut page_no = self.root;
        loop {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let page = self.pager.read_page(page_no, cancel).await?;
            let bytes = page.as_bytes();
            let (header, pointers) = self.read_page_structure(bytes, page_no)?;

            if header.kind.is_leaf() {
                return self.collect_leaf_matches(bytes, &pointers, header.kind, page_no, key);
            }

            // Interior descent: the first cell whose key is >= the search
            // key bounds the subtree holding it; otherwise the rightmost
            // child does.
            let mut target = header
                .right_child
                .expect("interior header carries rightmost child");
            for (idx, &ptr) in pointers.iter().enumerate() {
                let cell = match self.checked_cell(bytes, ptr, header.kind, page_no) {
                    Ok(cell) => cell,
                    Err(err) => {
                        self.note_cell_error(err, page_no, idx)?;
                        continue;
                    }
                };
                let cell_key = match self.extract_key(&cell, bytes) {
                    Ok(k) => k,
                    Err(err) => {
                        self.note_cell_error(err, page_no, idx)?;
                        continue;
                    }
                };
                if compare_search(key, &cell_key)? != Ordering::Greater {
                    target = cell.left_child().expect("interior cell carries left child");
                    break;
                }
            }
            debug!(page = page_no.get(), child = target.get(), "descend");
            page_no = target;
        }
    }

    fn read_page_structure(
        &self,
        bytes: &[u8],
        page_no: PageNumber,
    ) -> Result<(PageHeader, Vec<u16>)> {
        let header_offset = header_offset_for_page(page_no);
        let header = PageHeader::parse(bytes, header_offset, page_no)?;
        if !self.kind.accepts(header.kind) {
            return Err(ScanError::corrupt_page(
                page_no.get(),
                format!(
                    "page kind {:?} does not belong to a {:?} tree",
                    header.kind, self.kind
                ),
            ));
        }
        let pointers = cell_pointers(bytes, &header, header_offset, page_no)?;
        Ok((header, pointers))
    }

    /// Parse a cell after validating its pointer against the page bounds.
    fn checked_cell(
        &self,
        bytes: &[u8],
        ptr: u16,
        kind: PageKind,
        page_no: PageNumber,
    ) -> Result<Cell> {
        let offset = ptr as usize;
        if offset >= bytes.len() {
            return Err(ScanError::CellOutOfBounds {
                page: page_no.get(),
                offset,
                detail: "cell pointer past page end",
            });
        }
        Cell::parse(bytes, offset, kind, page_no)
    }

    fn parse_leaf_entry(
        &self,
        bytes: &[u8],
        ptr: u16,
        kind: PageKind,
        page_no: PageNumber,
    ) -> Result<LeafEntry> {
        let cell = self.checked_cell(bytes, ptr, kind, page_no)?;
        let payload = cell
            .payload(bytes)
            .ok_or_else(|| ScanError::internal("leaf cell without payload"))?;
        let record = parse_record(payload)?;
        let rowid = match cell {
            Cell::TableLeaf { rowid, .. } => Some(rowid),
            _ => None,
        };
        Ok(LeafEntry {
            page: page_no,
            rowid,
            record,
        })
    }

    fn collect_leaf_matches(
        &self,
        bytes: &[u8],
        pointers: &[u16],
        kind: PageKind,
        page_no: PageNumber,
        key: &SearchKey,
    ) -> Result<Vec<LeafEntry>> {
        let mut matches = Vec::new();
        for (idx, &ptr) in pointers.iter().enumerate() {
            let entry = match self.parse_leaf_entry(bytes, ptr, kind, page_no) {
                Ok(entry) => entry,
                Err(err) => {
                    self.note_cell_error(err, page_no, idx)?;
                    continue;
                }
            };
            let matched = match (key, self.kind) {
                (SearchKey::Rowid(wanted), TreeKind::Table) => entry.rowid == Some(*wanted),
                (SearchKey::Bytes(wanted), TreeKind::Index) => entry
                    .record
                    .value(0)
                    .is_some_and(|v| v.key_bytes() == *wanted),
                _ => {
                    return Err(ScanError::internal(
                        "search key does not match tree kind",
                    ))
                }
            };
            if matched {
                matches.push(entry);
            }
        }
        Ok(matches)
    }

    fn extract_key(&self, cell: &Cell, bytes: &[u8]) -> Result<SearchKey> {
        match (self.kind, cell) {
            (TreeKind::Table, Cell::TableInterior { rowid, .. })
            | (TreeKind::Table, Cell::TableLeaf { rowid, .. }) => Ok(SearchKey::Rowid(*rowid)),
            (TreeKind::Index, Cell::IndexInterior { .. })
            | (TreeKind::Index, Cell::IndexLeaf { .. }) => {
                let payload = cell
                    .payload(bytes)
                    .ok_or_else(|| ScanError::internal("index cell without payload"))?;
                let record = parse_record(payload)?;
                let first = record
                    .value(0)
                    .ok_or_else(|| ScanError::malformed("index record has no key column"))?;
                Ok(SearchKey::Bytes(first.key_bytes()))
            }
            _ => Err(ScanError::internal("cell variant does not match tree kind")),
        }
    }

    /// Apply the configured per-cell strategy to one failed cell.
    fn note_cell_error(&self, err: ScanError, page: PageNumber, cell_index: usize) -> Result<()> {
        match self.strategy {
            CellErrorStrategy::Fail => Err(err),
            CellErrorStrategy::Skip => {
                warn!(
                    page = page.get(),
                    cell_index,
                    error = %err,
                    "skipping unparseable cell"
                );
                Ok(())
            }
        }
    }
}

/// Order a search key against a cell key of the same kind.
fn compare_search(search: &SearchKey, cell: &SearchKey) -> Result<Ordering> {
    match (search, cell) {
        (SearchKey::Rowid(a), SearchKey::Rowid(b)) => Ok(a.cmp(b)),
        (SearchKey::Bytes(a), SearchKey::Bytes(b)) => Ok(compare_key_bytes(a, b)),
        _ => Err(ScanError::internal("mismatched key kinds in comparison")),
    }
}
