use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Primary error type for all litescan operations.
///
/// One sum type for the whole reader: byte-level codecs report the precise
/// format violation, and callers attach the surrounding context (page number,
/// byte offset, table name) through the variant fields rather than wrapping.
#[derive(Error, Debug)]
pub enum ScanError {
    // === File errors ===
    /// Database file not found.
    #[error("database not found: '{path}'")]
    DatabaseNotFound { path: PathBuf },

    /// Database file exists but could not be opened.
    #[error("unable to open database file: '{path}'")]
    CannotOpen { path: PathBuf },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A positioned page read returned fewer bytes than a full page.
    #[error("incomplete page read: page {page}, expected {expected} bytes, got {actual}")]
    ShortRead {
        page: u32,
        expected: usize,
        actual: usize,
    },

    /// Page number outside `[1, total_pages]`.
    #[error("page {page} out of range: database has {count} pages")]
    PageOutOfRange { page: u32, count: u32 },

    // === Format errors ===
    /// The file does not begin with the SQLite magic string.
    #[error("file is not a database: '{path}'")]
    NotADatabase { path: PathBuf },

    /// The header's page size is not a power of two in [512, 65536].
    #[error("invalid page size: {raw}")]
    InvalidPageSize { raw: u16 },

    /// The database uses a text encoding other than UTF-8.
    #[error("unsupported text encoding: {raw} (only UTF-8 databases are supported)")]
    UnsupportedTextEncoding { raw: u32 },

    /// A B-tree page header flag byte is not one of the four legal kinds.
    #[error("unsupported page kind {flag:#04x} on page {page}")]
    UnsupportedPageKind { flag: u8, page: u32 },

    /// A varint ran past the end of its buffer.
    #[error("parse_varint: truncated varint at offset {offset}")]
    InvalidVarint { offset: usize },

    /// Reserved serial types 10 and 11.
    #[error("invalid serial type {serial_type}")]
    InvalidSerialType { serial_type: u64 },

    /// A cell field would extend beyond the page.
    #[error("cell out of bounds on page {page} at offset {offset}: {detail}")]
    CellOutOfBounds {
        page: u32,
        offset: usize,
        detail: &'static str,
    },

    /// A cell payload spills into overflow pages, which this reader refuses
    /// rather than truncates.
    #[error("cell payload of {payload_size} bytes on page {page} requires overflow pages (not supported)")]
    OverflowNotSupported { page: u32, payload_size: u64 },

    /// A record body disagrees with its own header.
    #[error("malformed record: {detail}")]
    MalformedRecord { detail: String },

    /// Page-level structural corruption (bad header, zero child pointer,
    /// pointer array past the page end).
    #[error("corrupt page {page}: {detail}")]
    CorruptPage { page: u32, detail: String },

    // === Schema errors ===
    /// No such table.
    #[error("no such table: {name}")]
    NoSuchTable { name: String },

    /// No such column.
    #[error("no such column: {name}")]
    NoSuchColumn { name: String },

    /// Ambiguous column reference.
    #[error("ambiguous column name: {name}")]
    AmbiguousColumn { name: String },

    /// A CREATE TABLE / CREATE INDEX body the DDL parser cannot make sense of.
    #[error("unparseable schema for {name}: {detail}")]
    SchemaUnparseable { name: String, detail: String },

    // === Query errors ===
    /// SQL syntax error.
    #[error("near \"{token}\": syntax error")]
    SyntaxError { token: String },

    /// Statement kind the executor refuses (INSERT, UPDATE, ...).
    #[error("unsupported statement: {detail}")]
    UnsupportedStatement { detail: String },

    /// Comparison operator outside the supported set.
    #[error("unsupported operator: {op}")]
    UnsupportedOperator { op: String },

    /// Function other than COUNT in the projection.
    #[error("unsupported function: {name}")]
    UnsupportedFunction { name: String },

    // === Lifecycle errors ===
    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// An operation-level deadline elapsed.
    #[error("operation timed out after {after:?}")]
    TimedOut { after: Duration },

    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// SQLite-style numeric result codes, used for process exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Successful result.
    Ok = 0,
    /// Generic error (bad query, unknown table or column).
    Error = 1,
    /// Internal logic error.
    Internal = 2,
    /// Interrupted (cancellation or timeout).
    Interrupt = 9,
    /// Disk I/O error.
    IoErr = 10,
    /// Database disk image is malformed.
    Corrupt = 11,
    /// Unable to open the database file.
    CantOpen = 14,
    /// Not a database file.
    NotADb = 26,
}

impl ScanError {
    /// Map this error to its numeric result code.
    #[allow(clippy::match_same_arms)]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::DatabaseNotFound { .. } | Self::CannotOpen { .. } => ErrorCode::CantOpen,
            Self::Io(_) | Self::ShortRead { .. } => ErrorCode::IoErr,
            Self::NotADatabase { .. } => ErrorCode::NotADb,
            Self::PageOutOfRange { .. }
            | Self::InvalidPageSize { .. }
            | Self::UnsupportedTextEncoding { .. }
            | Self::UnsupportedPageKind { .. }
            | Self::InvalidVarint { .. }
            | Self::InvalidSerialType { .. }
            | Self::CellOutOfBounds { .. }
            | Self::OverflowNotSupported { .. }
            | Self::MalformedRecord { .. }
            | Self::CorruptPage { .. } => ErrorCode::Corrupt,
            Self::NoSuchTable { .. }
            | Self::NoSuchColumn { .. }
            | Self::AmbiguousColumn { .. }
            | Self::SchemaUnparseable { .. }
            | Self::SyntaxError { .. }
            | Self::UnsupportedStatement { .. }
            | Self::UnsupportedOperator { .. }
            | Self::UnsupportedFunction { .. } => ErrorCode::Error,
            Self::Cancelled | Self::TimedOut { .. } => ErrorCode::Interrupt,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether the user caused this (bad query) as opposed to the file
    /// (corruption, I/O) or the environment (timeout).
    pub const fn is_user_fault(&self) -> bool {
        matches!(
            self,
            Self::NoSuchTable { .. }
                | Self::NoSuchColumn { .. }
                | Self::AmbiguousColumn { .. }
                | Self::SyntaxError { .. }
                | Self::UnsupportedStatement { .. }
                | Self::UnsupportedOperator { .. }
                | Self::UnsupportedFunction { .. }
        )
    }

    /// Process exit code for CLI use.
    pub const fn exit_code(&self) -> i32 {
        self.error_code() as i32
    }

    /// Create a syntax error.
    pub fn syntax(token: impl Into<String>) -> Self {
        Self::SyntaxError {
            token: token.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a malformed-record error.
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedRecord {
            detail: detail.into(),
        }
    }

    /// Create a corrupt-page error.
    pub fn corrupt_page(page: u32, detail: impl Into<String>) -> Self {
        Self::CorruptPage {
            page,
            detail: detail.into(),
        }
    }
}

/// Result type alias using `ScanError`.
pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ScanError::syntax("SELEC");
        assert_eq!(err.to_string(), r#"near "SELEC": syntax error"#);
    }

    #[test]
    fn error_display_short_read() {
        let err = ScanError::ShortRead {
            page: 7,
            expected: 4096,
            actual: 100,
        };
        assert_eq!(
            err.to_string(),
            "incomplete page read: page 7, expected 4096 bytes, got 100"
        );
    }

    #[test]
    fn error_code_mapping() {
        assert_eq!(
            ScanError::DatabaseNotFound {
                path: PathBuf::from("missing.db")
            }
            .error_code(),
            ErrorCode::CantOpen
        );
        assert_eq!(
            ScanError::NotADatabase {
                path: PathBuf::from("junk.bin")
            }
            .error_code(),
            ErrorCode::NotADb
        );
        assert_eq!(
            ScanError::InvalidVarint { offset: 3 }.error_code(),
            ErrorCode::Corrupt
        );
        assert_eq!(ScanError::Cancelled.error_code(), ErrorCode::Interrupt);
        assert_eq!(
            ScanError::syntax("DROP").error_code(),
            ErrorCode::Error
        );
        assert_eq!(
            ScanError::internal("bug").error_code(),
            ErrorCode::Internal
        );
    }

    #[test]
    fn user_fault_classification() {
        assert!(ScanError::syntax("x").is_user_fault());
        assert!(ScanError::NoSuchTable {
            name: "nope".to_owned()
        }
        .is_user_fault());
        assert!(!ScanError::Cancelled.is_user_fault());
        assert!(!ScanError::CorruptPage {
            page: 2,
            detail: String::new()
        }
        .is_user_fault());
    }

    #[test]
    fn exit_codes_nonzero() {
        assert_eq!(ScanError::syntax("x").exit_code(), 1);
        assert_eq!(ScanError::internal("x").exit_code(), 2);
        assert_eq!(ScanError::Cancelled.exit_code(), 9);
        assert_eq!(
            ScanError::TimedOut {
                after: Duration::from_secs(3)
            }
            .exit_code(),
            9
        );
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: ScanError = io_err.into();
        assert!(matches!(err, ScanError::Io(_)));
        assert_eq!(err.error_code(), ErrorCode::IoErr);
    }
}
