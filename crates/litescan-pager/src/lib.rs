//! The pager: exclusive owner of the database file handle.
//!
//! Opens the file read-only, validates the 100-byte header once, and serves
//! whole pages through positioned reads. A fixed permit set bounds how many
//! reads may be outstanding at a time so query fan-out cannot starve other
//! readers; every read honors a cancellation token before any I/O happens.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use litescan_error::{Result, ScanError};
use litescan_types::{
    CancelToken, DatabaseHeader, HeaderError, PageData, PageNumber, DB_HEADER_SIZE,
};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Default bound on concurrently outstanding page reads.
pub const DEFAULT_MAX_CONCURRENT_READS: usize = 10;

/// Pager configuration.
#[derive(Debug, Clone)]
pub struct PagerConfig {
    /// Size of the read permit set.
    pub max_concurrent_reads: usize,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reads: DEFAULT_MAX_CONCURRENT_READS,
        }
    }
}

impl PagerConfig {
    pub fn with_max_concurrent_reads(mut self, n: usize) -> Self {
        self.max_concurrent_reads = n.max(1);
        self
    }
}

/// Read-only paged access to one database file.
pub struct Pager {
    file: Arc<File>,
    path: PathBuf,
    header: DatabaseHeader,
    page_size: usize,
    total_pages: u32,
    permits: Semaphore,
}

impl std::fmt::Debug for Pager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .field("total_pages", &self.total_pages)
            .finish_non_exhaustive()
    }
}

impl Pager {
    /// Open a database file, validate its header, and record the page
    /// geometry. The file handle is shared behind the permit gate and
    /// accessed only through positioned reads.
    pub fn open(path: impl AsRef<Path>, config: PagerConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ScanError::DatabaseNotFound { path: path.clone() },
            _ => ScanError::CannotOpen { path: path.clone() },
        })?;

        let file_len = file.metadata().map_err(ScanError::Io)?.len();
        if file_len < DB_HEADER_SIZE as u64 {
            return Err(ScanError::NotADatabase { path });
        }

        let mut header_buf = [0u8; DB_HEADER_SIZE];
        read_exact_at(&file, &mut header_buf, 0).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ScanError::NotADatabase { path: path.clone() },
            _ => ScanError::Io(e),
        })?;

        let header =
            DatabaseHeader::from_bytes(&header_buf).map_err(|e| header_error(e, &path))?;
        let page_size = header.page_size.as_usize();

        // Legacy writers may leave the header page count zero or stale; the
        // file length is authoritative then.
        let total_pages = if header.page_count_is_valid() {
            header.page_count
        } else {
            u32::try_from(file_len / page_size as u64).unwrap_or(u32::MAX)
        };

        info!(
            path = %path.display(),
            page_size,
            total_pages,
            "opened database"
        );

        Ok(Self {
            file: Arc::new(file),
            path,
            header,
            page_size,
            total_pages,
            permits: Semaphore::new(config.max_concurrent_reads.max(1)),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> u32 {
        self.total_pages
    }

    pub fn header(&self) -> &DatabaseHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read page `n` (1-indexed) as a page-sized buffer.
    ///
    /// Suspends on permit acquisition and on the positioned read itself. If
    /// the token fires before a permit is obtained, this fails with
    /// [`ScanError::Cancelled`] without touching the file. A short read is
    /// fatal: never retried, never padded.
    pub async fn read_page(&self, page: PageNumber, cancel: &CancelToken) -> Result<PageData> {
        if page.get() > self.total_pages {
            return Err(ScanError::PageOutOfRange {
                page: page.get(),
                count: self.total_pages,
            });
        }

        let permit = tokio::select! {
            permit = self.permits.acquire() => {
                permit.map_err(|_| ScanError::internal("pager permit set closed"))?
            }
            () = cancel.cancelled() => return Err(ScanError::Cancelled),
        };
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let file = Arc::clone(&self.file);
        let page_size = self.page_size;
        let page_no = page.get();
        let offset = u64::from(page_no - 1) * page_size as u64;

        let read = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; page_size];
            let n = read_up_to(&file, &mut buf, offset)?;
            Ok::<(Vec<u8>, usize), io::Error>((buf, n))
        })
        .await
        .map_err(|e| ScanError::internal(format!("page read task failed: {e}")))?;

        drop(permit);

        let (buf, n) = read.map_err(ScanError::Io)?;
        if n != page_size {
            return Err(ScanError::ShortRead {
                page: page_no,
                expected: page_size,
                actual: n,
            });
        }

        debug!(page = page_no, offset, "read page");
        Ok(PageData::from_vec(buf))
    }
}

fn header_error(err: HeaderError, path: &Path) -> ScanError {
    match err {
        HeaderError::InvalidMagic => ScanError::NotADatabase {
            path: path.to_path_buf(),
        },
        HeaderError::InvalidPageSize { raw } => ScanError::InvalidPageSize { raw },
        HeaderError::UnsupportedTextEncoding { raw } => ScanError::UnsupportedTextEncoding { raw },
        HeaderError::InvalidPayloadFractions { .. }
        | HeaderError::UnsupportedReadVersion { .. }
        | HeaderError::InvalidSchemaFormat { .. } => ScanError::CorruptPage {
            page: 1,
            detail: err.to_string(),
        },
    }
}

/// Positioned read filling as much of `buf` as the file provides, returning
/// the number of bytes read. Never moves a shared seek pointer.
fn read_up_to(file: &File, buf: &mut [u8], mut offset: u64) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match read_at(file, &mut buf[filled..], offset) {
            Ok(0) => break,
            Ok(n) => {
                filled += n;
                offset += n as u64;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    let n = read_up_to(file, buf, offset)?;
    if n == buf.len() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "short positioned read",
        ))
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use litescan_testkit::DbBuilder;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    fn empty_db(page_size: usize) -> Vec<u8> {
        DbBuilder::new(page_size).finish()
    }

    #[test]
    fn open_missing_file() {
        let err = Pager::open("/definitely/not/here.db", PagerConfig::default()).unwrap_err();
        assert!(matches!(err, ScanError::DatabaseNotFound { .. }));
    }

    #[test]
    fn open_rejects_non_database() {
        let f = write_temp(&[0u8; 200]);
        let err = Pager::open(f.path(), PagerConfig::default()).unwrap_err();
        assert!(matches!(err, ScanError::NotADatabase { .. }));
    }

    #[test]
    fn open_rejects_tiny_file() {
        let f = write_temp(b"SQLite format 3\0");
        let err = Pager::open(f.path(), PagerConfig::default()).unwrap_err();
        assert!(matches!(err, ScanError::NotADatabase { .. }));
    }

    #[test]
    fn open_valid_database() {
        let f = write_temp(&empty_db(4096));
        let pager = Pager::open(f.path(), PagerConfig::default()).unwrap();
        assert_eq!(pager.page_size(), 4096);
        assert_eq!(pager.page_count(), 1);
    }

    #[tokio::test]
    async fn read_page_one() {
        let bytes = empty_db(512);
        let f = write_temp(&bytes);
        let pager = Pager::open(f.path(), PagerConfig::default()).unwrap();
        let page = pager
            .read_page(PageNumber::ONE, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(page.len(), 512);
        assert_eq!(&page.as_bytes()[..16], b"SQLite format 3\0");
    }

    #[tokio::test]
    async fn read_page_out_of_range() {
        let f = write_temp(&empty_db(512));
        let pager = Pager::open(f.path(), PagerConfig::default()).unwrap();
        let err = pager
            .read_page(PageNumber::new(2).unwrap(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::PageOutOfRange { page: 2, count: 1 }
        ));
    }

    #[tokio::test]
    async fn read_page_short_read_is_fatal() {
        // Header claims 2 pages but the file holds only 1.5.
        let mut builder = DbBuilder::new(512);
        builder.push_raw_page(vec![0xAA; 512]);
        let mut bytes = builder.finish();
        bytes.truncate(512 + 256);
        let f = write_temp(&bytes);
        let pager = Pager::open(f.path(), PagerConfig::default()).unwrap();
        let err = pager
            .read_page(PageNumber::new(2).unwrap(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::ShortRead {
                page: 2,
                expected: 512,
                actual: 256
            }
        ));
    }

    #[tokio::test]
    async fn cancelled_before_permit_means_no_io() {
        let f = write_temp(&empty_db(512));
        let pager = Pager::open(f.path(), PagerConfig::default()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = pager.read_page(PageNumber::ONE, &cancel).await.unwrap_err();
        assert!(matches!(err, ScanError::Cancelled));
    }

    #[tokio::test]
    async fn concurrent_reads_share_the_file() {
        let mut builder = DbBuilder::new(512);
        for i in 0..20u8 {
            builder.push_raw_page(vec![i; 512]);
        }
        let f = write_temp(&builder.finish());
        let pager = Arc::new(Pager::open(f.path(), PagerConfig::default()).unwrap());
        let cancel = CancelToken::new();

        let mut handles = Vec::new();
        for i in 0..20u32 {
            let pager = Arc::clone(&pager);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let page = PageNumber::new(i + 2).unwrap();
                pager.read_page(page, &cancel).await
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let page = handle.await.unwrap().unwrap();
            assert_eq!(page.as_bytes()[0], i as u8);
        }
    }
}
