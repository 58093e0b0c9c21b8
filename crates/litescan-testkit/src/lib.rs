//! Fixture builders for litescan tests.
//!
//! The product crates are strictly read-only, so the encoders live here:
//! varint and record serialization, B-tree page assembly, and a whole-file
//! [`DbBuilder`] that produces byte-exact SQLite database images for
//! integration tests. Used only as a dev-dependency.

use litescan_types::{Value, DB_MAGIC};

/// Append a SQLite varint encoding of `value` to `out`.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    if value <= 0x7F {
        out.push(value as u8);
        return;
    }
    if value > 0x00FF_FFFF_FFFF_FFFF {
        // 9-byte form: eight 7-bit continuation bytes, then 8 raw bits.
        let mut bytes = [0u8; 9];
        bytes[8] = value as u8;
        let mut v = value >> 8;
        for i in (0..8).rev() {
            bytes[i] = (v as u8 & 0x7F) | 0x80;
            v >>= 7;
        }
        out.extend_from_slice(&bytes);
        return;
    }
    let mut stack = Vec::new();
    let mut v = value;
    while v > 0 {
        stack.push((v & 0x7F) as u8);
        v >>= 7;
    }
    for (i, b) in stack.iter().rev().enumerate() {
        if i == stack.len() - 1 {
            out.push(*b);
        } else {
            out.push(b | 0x80);
        }
    }
}

/// The serial type SQLite would choose for `value` (smallest encoding,
/// schema format 4: constants 0 and 1 use serial types 8 and 9).
pub fn serial_type_for(value: &Value) -> u64 {
    match value {
        Value::Null => 0,
        Value::Zero => 8,
        Value::One => 9,
        Value::Integer(0) => 8,
        Value::Integer(1) => 9,
        Value::Integer(i) => {
            let u = if *i < 0 { !(*i as u64) } else { *i as u64 };
            if u <= 0x7F {
                1
            } else if u <= 0x7FFF {
                2
            } else if u <= 0x7F_FFFF {
                3
            } else if u <= 0x7FFF_FFFF {
                4
            } else if u <= 0x7FFF_FFFF_FFFF {
                5
            } else {
                6
            }
        }
        Value::Float(_) => 7,
        Value::Text(s) => s.len() as u64 * 2 + 13,
        Value::Blob(b) => b.len() as u64 * 2 + 12,
    }
}

fn value_body(value: &Value, serial_type: u64, out: &mut Vec<u8>) {
    match value {
        Value::Null | Value::Zero | Value::One => {}
        Value::Integer(i) => match serial_type {
            8 | 9 => {}
            1..=6 => {
                let width = match serial_type {
                    1 => 1,
                    2 => 2,
                    3 => 3,
                    4 => 4,
                    5 => 6,
                    _ => 8,
                };
                let bytes = i.to_be_bytes();
                out.extend_from_slice(&bytes[8 - width..]);
            }
            _ => unreachable!("integer with non-integer serial type"),
        },
        Value::Float(f) => out.extend_from_slice(&f.to_bits().to_be_bytes()),
        Value::Text(s) => out.extend_from_slice(s.as_bytes()),
        Value::Blob(b) => out.extend_from_slice(b),
    }
}

/// Serialize values into the SQLite record format (header + body).
pub fn serialize_record(values: &[Value]) -> Vec<u8> {
    let serial_types: Vec<u64> = values.iter().map(serial_type_for).collect();

    let mut types_bytes = Vec::new();
    for &st in &serial_types {
        write_varint(&mut types_bytes, st);
    }

    // The header size varint counts itself; small records need one byte.
    let mut header_size = types_bytes.len() + 1;
    loop {
        let mut probe = Vec::new();
        write_varint(&mut probe, header_size as u64);
        let needed = probe.len() + types_bytes.len();
        if needed <= header_size {
            break;
        }
        header_size = needed;
    }

    let mut out = Vec::new();
    write_varint(&mut out, header_size as u64);
    out.extend_from_slice(&types_bytes);
    for (value, &st) in values.iter().zip(&serial_types) {
        value_body(value, st, &mut out);
    }
    out
}

/// Convenience constructors for record values.
pub fn text(s: &str) -> Value {
    Value::Text(s.to_owned())
}

pub fn int(i: i64) -> Value {
    Value::Integer(i)
}

/// Assemble one B-tree page: header, pointer array in cell order, cell
/// bodies packed downward from the page end.
pub fn build_page(
    flag: u8,
    header_offset: usize,
    page_size: usize,
    cell_bodies: &[Vec<u8>],
    rightmost: Option<u32>,
) -> Vec<u8> {
    let mut page = vec![0u8; page_size];
    let header_len = if rightmost.is_some() { 12 } else { 8 };

    let mut pos = page_size;
    let mut offsets = Vec::with_capacity(cell_bodies.len());
    for body in cell_bodies {
        pos -= body.len();
        page[pos..pos + body.len()].copy_from_slice(body);
        offsets.push(pos as u16);
    }

    let ptr_array_end = header_offset + header_len + 2 * cell_bodies.len();
    assert!(ptr_array_end <= pos, "page overfull: {ptr_array_end} > {pos}");

    page[header_offset] = flag;
    // first_freeblock stays 0
    page[header_offset + 3..header_offset + 5]
        .copy_from_slice(&(cell_bodies.len() as u16).to_be_bytes());
    let content_start = if pos == 65_536 { 0u16 } else { pos as u16 };
    page[header_offset + 5..header_offset + 7].copy_from_slice(&content_start.to_be_bytes());
    if let Some(right) = rightmost {
        page[header_offset + 8..header_offset + 12].copy_from_slice(&right.to_be_bytes());
    }
    for (i, off) in offsets.iter().enumerate() {
        let at = header_offset + header_len + 2 * i;
        page[at..at + 2].copy_from_slice(&off.to_be_bytes());
    }
    page
}

/// One leaf-table cell body: payload-size varint, rowid varint, payload.
pub fn table_leaf_cell(rowid: u64, payload: &[u8]) -> Vec<u8> {
    let mut cell = Vec::new();
    write_varint(&mut cell, payload.len() as u64);
    write_varint(&mut cell, rowid);
    cell.extend_from_slice(payload);
    cell
}

/// One interior-table cell body: left child, rowid key varint.
pub fn table_interior_cell(left_child: u32, rowid: u64) -> Vec<u8> {
    let mut cell = Vec::new();
    cell.extend_from_slice(&left_child.to_be_bytes());
    write_varint(&mut cell, rowid);
    cell
}

/// One leaf-index cell body: payload-size varint, payload.
pub fn index_leaf_cell(payload: &[u8]) -> Vec<u8> {
    let mut cell = Vec::new();
    write_varint(&mut cell, payload.len() as u64);
    cell.extend_from_slice(payload);
    cell
}

/// One interior-index cell body: left child, payload-size varint, payload.
pub fn index_interior_cell(left_child: u32, payload: &[u8]) -> Vec<u8> {
    let mut cell = Vec::new();
    cell.extend_from_slice(&left_child.to_be_bytes());
    write_varint(&mut cell, payload.len() as u64);
    cell.extend_from_slice(payload);
    cell
}

/// A schema object for the root-page-1 table.
#[derive(Debug, Clone)]
pub struct SchemaObj {
    pub object_type: &'static str,
    pub name: String,
    pub tbl_name: String,
    pub root_page: i64,
    pub sql: String,
}

impl SchemaObj {
    pub fn table(name: &str, root_page: u32, sql: &str) -> Self {
        Self {
            object_type: "table",
            name: name.to_owned(),
            tbl_name: name.to_owned(),
            root_page: i64::from(root_page),
            sql: sql.to_owned(),
        }
    }

    pub fn index(name: &str, tbl_name: &str, root_page: u32, sql: &str) -> Self {
        Self {
            object_type: "index",
            name: name.to_owned(),
            tbl_name: tbl_name.to_owned(),
            root_page: i64::from(root_page),
            sql: sql.to_owned(),
        }
    }

    fn record(&self) -> Vec<u8> {
        serialize_record(&[
            text(self.object_type),
            Value::Text(self.name.clone()),
            Value::Text(self.tbl_name.clone()),
            int(self.root_page),
            Value::Text(self.sql.clone()),
        ])
    }
}

/// Builds a complete database file image, page by page.
pub struct DbBuilder {
    page_size: usize,
    pages: Vec<Vec<u8>>,
}

impl DbBuilder {
    /// Start a new image. Page 1 begins as an empty schema page.
    pub fn new(page_size: usize) -> Self {
        let mut builder = Self {
            page_size,
            pages: vec![Vec::new()],
        };
        builder.set_schema(&[]);
        builder
    }

    /// Rebuild page 1 from schema objects (rowids assigned 1..n).
    pub fn set_schema(&mut self, objects: &[SchemaObj]) {
        let cells: Vec<Vec<u8>> = objects
            .iter()
            .enumerate()
            .map(|(i, obj)| table_leaf_cell(i as u64 + 1, &obj.record()))
            .collect();
        self.pages[0] = build_page(0x0D, 100, self.page_size, &cells, None);
    }

    /// Append a pre-built page, returning its 1-indexed page number.
    pub fn push_raw_page(&mut self, mut page: Vec<u8>) -> u32 {
        page.resize(self.page_size, 0);
        self.pages.push(page);
        self.pages.len() as u32
    }

    /// Append a leaf-table page holding `rows` as (rowid, record values).
    pub fn add_table_leaf(&mut self, rows: &[(u64, Vec<Value>)]) -> u32 {
        let cells: Vec<Vec<u8>> = rows
            .iter()
            .map(|(rowid, values)| table_leaf_cell(*rowid, &serialize_record(values)))
            .collect();
        self.push_raw_page(build_page(0x0D, 0, self.page_size, &cells, None))
    }

    /// Append an interior-table page over `children` (left_child, max rowid)
    /// plus the rightmost child.
    pub fn add_table_interior(&mut self, children: &[(u32, u64)], rightmost: u32) -> u32 {
        let cells: Vec<Vec<u8>> = children
            .iter()
            .map(|(child, rowid)| table_interior_cell(*child, *rowid))
            .collect();
        self.push_raw_page(build_page(0x05, 0, self.page_size, &cells, Some(rightmost)))
    }

    /// Append a leaf-index page; each entry is the full key-columns-plus-
    /// trailing-rowid value list.
    pub fn add_index_leaf(&mut self, entries: &[Vec<Value>]) -> u32 {
        let cells: Vec<Vec<u8>> = entries
            .iter()
            .map(|values| index_leaf_cell(&serialize_record(values)))
            .collect();
        self.push_raw_page(build_page(0x0A, 0, self.page_size, &cells, None))
    }

    /// Append an interior-index page over `children` (left_child, key record
    /// values) plus the rightmost child.
    pub fn add_index_interior(&mut self, children: &[(u32, Vec<Value>)], rightmost: u32) -> u32 {
        let cells: Vec<Vec<u8>> = children
            .iter()
            .map(|(child, values)| index_interior_cell(*child, &serialize_record(values)))
            .collect();
        self.push_raw_page(build_page(0x02, 0, self.page_size, &cells, Some(rightmost)))
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Produce the file image: database header stamped into page 1,
    /// all pages concatenated.
    pub fn finish(mut self) -> Vec<u8> {
        let count = self.pages.len() as u32;
        let page1 = &mut self.pages[0];
        page1[..16].copy_from_slice(DB_MAGIC);
        let raw_page_size: u16 = if self.page_size == 65_536 {
            1
        } else {
            self.page_size as u16
        };
        page1[16..18].copy_from_slice(&raw_page_size.to_be_bytes());
        page1[18] = 1; // write version: rollback journal
        page1[19] = 1; // read version
        page1[20] = 0; // reserved bytes per page
        page1[21] = 64;
        page1[22] = 32;
        page1[23] = 32;
        page1[24..28].copy_from_slice(&1u32.to_be_bytes()); // change counter
        page1[28..32].copy_from_slice(&count.to_be_bytes());
        page1[40..44].copy_from_slice(&1u32.to_be_bytes()); // schema cookie
        page1[44..48].copy_from_slice(&4u32.to_be_bytes()); // schema format
        page1[56..60].copy_from_slice(&1u32.to_be_bytes()); // utf-8
        page1[92..96].copy_from_slice(&1u32.to_be_bytes()); // version valid for
        page1[96..100].copy_from_slice(&3_045_001u32.to_be_bytes());

        self.pages.concat()
    }
}
