//! The log file used by the commit path.
//!
//! The buffer pool writes one [`LogRecord::Write`] per dirty page right
//! before forcing that page to disk, plus a commit or abort marker when the
//! transaction completes. Recovery beyond this hook is out of scope; the
//! records exist so a recovery manager could replay or undo them.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::PageId;

/// A byte offset into the log file.
pub type Lsn = u64;

const RECORD_HEADER_LEN: usize = 8; // total_len u32 + crc u32

/// A single record in the log file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum LogRecord {
    /// A page image pair captured before the page was forced to disk.
    Write {
        tx: u64,
        page_id: PageId,
        before: Vec<u8>,
        after: Vec<u8>,
    },
    /// The transaction committed; all of its pages reached disk first.
    Commit { tx: u64 },
    /// The transaction aborted; its cached pages were re-read from disk.
    Abort { tx: u64 },
}

/// An append-only log backed by a single file.
pub struct LogFile {
    file: File,
    path: PathBuf,
    next_lsn: Lsn,
}

impl LogFile {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path_buf)?;
        let next_lsn = file.metadata()?.len();
        Ok(Self {
            file,
            path: path_buf,
            next_lsn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a before/after image pair for `page_id`.
    pub fn log_write(
        &mut self,
        tx: u64,
        page_id: PageId,
        before: Vec<u8>,
        after: Vec<u8>,
    ) -> io::Result<Lsn> {
        self.append(&LogRecord::Write {
            tx,
            page_id,
            before,
            after,
        })
    }

    pub fn log_commit(&mut self, tx: u64) -> io::Result<Lsn> {
        self.append(&LogRecord::Commit { tx })
    }

    pub fn log_abort(&mut self, tx: u64) -> io::Result<Lsn> {
        self.append(&LogRecord::Abort { tx })
    }

    fn append(&mut self, record: &LogRecord) -> io::Result<Lsn> {
        let body = bincode::serialize(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let total_len = (RECORD_HEADER_LEN + body.len()) as u32;

        let mut hasher = Hasher::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let lsn = self.next_lsn;
        self.file.seek(SeekFrom::Start(lsn))?;
        self.file.write_all(&total_len.to_be_bytes())?;
        self.file.write_all(&crc.to_be_bytes())?;
        self.file.write_all(&body)?;
        self.file.sync_all()?;
        self.next_lsn += total_len as u64;
        Ok(lsn)
    }

    /// Reads every record back, verifying each checksum.
    pub fn records(&mut self) -> io::Result<Vec<LogRecord>> {
        let mut buf = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut buf)?;

        let mut records = Vec::new();
        let mut pos = 0usize;
        while pos + RECORD_HEADER_LEN <= buf.len() {
            let total_len =
                u32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
            let crc = u32::from_be_bytes(buf[pos + 4..pos + 8].try_into().unwrap());
            if total_len < RECORD_HEADER_LEN || pos + total_len > buf.len() {
                break; // torn tail
            }
            let body = &buf[pos + RECORD_HEADER_LEN..pos + total_len];

            let mut hasher = Hasher::new();
            hasher.update(body);
            if hasher.finalize() != crc {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "log record crc mismatch",
                ));
            }
            let record = bincode::deserialize(body)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            records.push(record);
            pos += total_len;
        }
        Ok(records)
    }
}
