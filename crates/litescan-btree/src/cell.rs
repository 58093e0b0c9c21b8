//! B-tree page and cell parsing.
//!
//! # Page layout (from the SQLite file format)
//!
//! ```text
//! ┌──────────────────────────┐
//! │ Page header (8 or 12 B)  │  (12 for interior, 8 for leaf)
//! ├──────────────────────────┤
//! │ Cell pointer array       │  (2 bytes per cell, key order)
//! ├──────────────────────────┤
//! │ Unallocated space        │
//! ├──────────────────────────┤
//! │ Cell content area        │  (grows downward from end of page)
//! └──────────────────────────┘
//! ```
//!
//! Page 1 carries the 100-byte database header before its B-tree page
//! header; cell pointers there are still relative to the page start.

use std::ops::Range;

use litescan_error::{Result, ScanError};
use litescan_types::{PageNumber, DB_HEADER_SIZE};
use litescan_types::serial_type::read_varint;

/// Size of the leaf page header.
pub const LEAF_HEADER_SIZE: usize = 8;
/// Size of the interior page header (includes the rightmost child).
pub const INTERIOR_HEADER_SIZE: usize = 12;

/// The four B-tree page kinds, identified by the flag byte at offset 0 of
/// the page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PageKind {
    /// Interior index page (0x02): key payloads + child pointers.
    InteriorIndex = 0x02,
    /// Interior table page (0x05): rowid keys + child pointers.
    InteriorTable = 0x05,
    /// Leaf index page (0x0A): key payloads only.
    LeafIndex = 0x0A,
    /// Leaf table page (0x0D): rowids + record payloads.
    LeafTable = 0x0D,
}

impl PageKind {
    pub const fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0x02 => Some(Self::InteriorIndex),
            0x05 => Some(Self::InteriorTable),
            0x0A => Some(Self::LeafIndex),
            0x0D => Some(Self::LeafTable),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_interior(self) -> bool {
        matches!(self, Self::InteriorIndex | Self::InteriorTable)
    }

    #[must_use]
    pub const fn is_leaf(self) -> bool {
        !self.is_interior()
    }

    #[must_use]
    pub const fn is_table(self) -> bool {
        matches!(self, Self::InteriorTable | Self::LeafTable)
    }

    #[must_use]
    pub const fn is_index(self) -> bool {
        !self.is_table()
    }

    #[must_use]
    pub const fn header_size(self) -> usize {
        if self.is_interior() {
            INTERIOR_HEADER_SIZE
        } else {
            LEAF_HEADER_SIZE
        }
    }
}

/// Parsed B-tree page header. All multi-byte fields are big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub kind: PageKind,
    /// Byte offset of the first freeblock (0 = none).
    pub first_freeblock: u16,
    pub cell_count: u16,
    /// First byte of the cell content area; stored 0 means 65536.
    pub content_start: u32,
    pub fragmented_bytes: u8,
    /// Rightmost child for interior pages.
    pub right_child: Option<PageNumber>,
}

impl PageHeader {
    /// Parse a page header from raw page bytes. `header_offset` is 0 for
    /// every page except page 1, where it is 100.
    pub fn parse(page: &[u8], header_offset: usize, page_no: PageNumber) -> Result<Self> {
        let remaining = page.len().saturating_sub(header_offset);
        if remaining < LEAF_HEADER_SIZE {
            return Err(ScanError::corrupt_page(
                page_no.get(),
                format!("page too small for B-tree header: {remaining} bytes at offset {header_offset}"),
            ));
        }

        let h = &page[header_offset..];
        let kind = PageKind::from_flag(h[0]).ok_or(ScanError::UnsupportedPageKind {
            flag: h[0],
            page: page_no.get(),
        })?;

        let first_freeblock = u16::from_be_bytes([h[1], h[2]]);
        let cell_count = u16::from_be_bytes([h[3], h[4]]);
        let raw_content_start = u16::from_be_bytes([h[5], h[6]]);
        let content_start = if raw_content_start == 0 {
            65_536
        } else {
            u32::from(raw_content_start)
        };
        let fragmented_bytes = h[7];

        let right_child = if kind.is_interior() {
            if remaining < INTERIOR_HEADER_SIZE {
                return Err(ScanError::corrupt_page(
                    page_no.get(),
                    "page too small for interior B-tree header",
                ));
            }
            let pgno = u32::from_be_bytes([h[8], h[9], h[10], h[11]]);
            Some(PageNumber::new(pgno).ok_or_else(|| {
                ScanError::corrupt_page(page_no.get(), "interior page has zero rightmost child")
            })?)
        } else {
            None
        };

        Ok(Self {
            kind,
            first_freeblock,
            cell_count,
            content_start,
            fragmented_bytes,
            right_child,
        })
    }
}

/// Header offset for a page: 100 on page 1, 0 everywhere else.
#[must_use]
pub const fn header_offset_for_page(page_no: PageNumber) -> usize {
    if page_no.get() == 1 {
        DB_HEADER_SIZE
    } else {
        0
    }
}

/// Read the cell pointer array: `cell_count` big-endian u16 offsets
/// immediately after the page header. Offsets are page-absolute, page 1
/// included.
pub fn cell_pointers(
    page: &[u8],
    header: &PageHeader,
    header_offset: usize,
    page_no: PageNumber,
) -> Result<Vec<u16>> {
    let start = header_offset + header.kind.header_size();
    let count = header.cell_count as usize;
    let end = start + count * 2;
    if end > page.len() {
        return Err(ScanError::corrupt_page(
            page_no.get(),
            format!("cell pointer array extends past page: {count} pointers at offset {start}"),
        ));
    }

    let mut pointers = Vec::with_capacity(count);
    for i in 0..count {
        let at = start + i * 2;
        pointers.push(u16::from_be_bytes([page[at], page[at + 1]]));
    }
    Ok(pointers)
}

/// One parsed cell. The payload is kept as a range into the page so the
/// caller decides when to decode the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Leaf-table: rowid plus a record payload.
    TableLeaf { rowid: u64, payload: Range<usize> },
    /// Interior-table: child pointer and rowid key, no payload.
    TableInterior { left_child: PageNumber, rowid: u64 },
    /// Leaf-index: record payload holding key columns + trailing rowid.
    IndexLeaf { payload: Range<usize> },
    /// Interior-index: child pointer plus a key payload.
    IndexInterior {
        left_child: PageNumber,
        payload: Range<usize>,
    },
}

impl Cell {
    /// Parse the cell at `offset` on a page of the given kind.
    ///
    /// Every field is bounds-checked against the page length. A payload
    /// whose end lies past the page would spill into overflow pages, which
    /// this reader refuses outright rather than truncating.
    pub fn parse(page: &[u8], offset: usize, kind: PageKind, page_no: PageNumber) -> Result<Self> {
        let pg = page_no.get();
        if offset >= page.len() {
            return Err(ScanError::CellOutOfBounds {
                page: pg,
                offset,
                detail: "cell offset past page end",
            });
        }

        let mut pos = offset;

        let left_child = if kind.is_interior() {
            let Some(bytes) = page.get(pos..pos + 4) else {
                return Err(ScanError::CellOutOfBounds {
                    page: pg,
                    offset,
                    detail: "left child pointer past page end",
                });
            };
            let pgno = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            pos += 4;
            Some(PageNumber::new(pgno).ok_or(ScanError::CellOutOfBounds {
                page: pg,
                offset,
                detail: "zero left child pointer",
            })?)
        } else {
            None
        };

        // Interior table cells carry only the child pointer and a rowid key.
        if kind == PageKind::InteriorTable {
            let (rowid, _) = read_varint(page, pos)?;
            return Ok(Self::TableInterior {
                left_child: left_child.expect("interior cell has left child"),
                rowid,
            });
        }

        let (payload_size, consumed) = read_varint(page, pos)?;
        pos += consumed;

        let rowid = if kind == PageKind::LeafTable {
            let (rowid, consumed) = read_varint(page, pos)?;
            pos += consumed;
            Some(rowid)
        } else {
            None
        };

        let payload_end = (pos as u64)
            .checked_add(payload_size)
            .ok_or(ScanError::CellOutOfBounds {
                page: pg,
                offset,
                detail: "payload size overflows",
            })?;
        if payload_end > page.len() as u64 {
            return Err(ScanError::OverflowNotSupported {
                page: pg,
                payload_size,
            });
        }
        let payload = pos..pos + payload_size as usize;

        Ok(match kind {
            PageKind::LeafTable => Self::TableLeaf {
                rowid: rowid.expect("leaf table cell has rowid"),
                payload,
            },
            PageKind::LeafIndex => Self::IndexLeaf { payload },
            PageKind::InteriorIndex => Self::IndexInterior {
                left_child: left_child.expect("interior cell has left child"),
                payload,
            },
            PageKind::InteriorTable => unreachable!("handled above"),
        })
    }

    /// The payload bytes, for the three variants that have one.
    pub fn payload<'a>(&self, page: &'a [u8]) -> Option<&'a [u8]> {
        match self {
            Self::TableLeaf { payload, .. }
            | Self::IndexLeaf { payload }
            | Self::IndexInterior { payload, .. } => Some(&page[payload.clone()]),
            Self::TableInterior { .. } => None,
        }
    }

    /// The child pointer, for interior variants.
    pub const fn left_child(&self) -> Option<PageNumber> {
        match self {
            Self::TableInterior { left_child, .. } | Self::IndexInterior { left_child, .. } => {
                Some(*left_child)
            }
            _ => None,
        }
    }
}
