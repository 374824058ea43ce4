use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::buffer_pool::{BufferPool, Permission};
use crate::error::{DbError, Result};
use crate::heap_page::HeapPage;
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};
use crate::{substrate_debug_log, PageId, PAGE_SIZE};

/// A heap file: the consecutive fixed-size pages backing one table.
///
/// The file is opened per call; no descriptor is kept between operations.
/// Page reads and writes address `page_no * PAGE_SIZE` directly.
#[derive(Debug)]
pub struct HeapFile {
    path: PathBuf,
    desc: Arc<TupleDesc>,
    id: u32,
}

impl HeapFile {
    /// Opens (creating if needed) the heap file at `path`.
    ///
    /// The table id is the CRC of the file's absolute path, so reopening the
    /// same file always yields the same id.
    pub fn open<P: AsRef<Path>>(path: P, desc: Arc<TupleDesc>) -> Result<Self> {
        let path_ref = path.as_ref();
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path_ref)?;
        let absolute = std::fs::canonicalize(path_ref)?;
        let id = crc32fast::hash(absolute.to_string_lossy().as_bytes());
        substrate_debug_log!("[HeapFile::open] {:?} -> table id {}", absolute, id);
        Ok(Self {
            path: absolute,
            desc,
            id,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole pages currently in the file; a trailing partial page does not
    /// count.
    pub fn num_pages(&self) -> Result<usize> {
        let len = std::fs::metadata(&self.path)?.len();
        Ok((len / PAGE_SIZE as u64) as usize)
    }

    /// Reads the page at `pid` straight from disk.
    pub fn read_page(&self, pid: PageId) -> Result<HeapPage> {
        let offset = pid.page_no as u64 * PAGE_SIZE as u64;
        let mut file = OpenOptions::new().read(true).open(&self.path)?;
        if offset + PAGE_SIZE as u64 > file.metadata()?.len() {
            return Err(DbError::PageOutOfRange(pid));
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; PAGE_SIZE];
        file.read_exact(&mut data)?;
        HeapPage::parse(pid, self.desc.clone(), &data)
    }

    /// Writes the page back to its slot in the file and clears its dirty bit.
    pub fn write_page(&self, page: &mut HeapPage) -> Result<()> {
        let offset = page.id().page_no as u64 * PAGE_SIZE as u64;
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.serialize())?;
        file.sync_all()?;
        if let Some(tx) = page.is_dirty() {
            page.mark_dirty(false, tx);
        }
        Ok(())
    }

    /// Extends the file by one zeroed page, returning its page number.
    fn append_empty_page(&self) -> Result<usize> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(&HeapPage::empty_page_data())?;
        file.sync_all()?;
        Ok(self.num_pages()? - 1)
    }

    /// Inserts `tuple` into the first page with a free slot, appending a new
    /// page when every existing one is full. Pages are fetched through the
    /// buffer pool under exclusive permission. Returns the dirtied pages.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tx: TransactionId,
        tuple: Tuple,
    ) -> Result<Vec<PageId>> {
        for page_no in 0..self.num_pages()? {
            let pid = PageId::new(self.id, page_no);
            let handle = pool.get_page(tx, pid, Permission::ReadWrite)?;
            let mut page = handle.write().unwrap();
            if page.empty_slot_count() == 0 {
                continue;
            }
            page.insert_tuple(tuple)?;
            // the dirty bit must be set under the same guard as the mutation
            page.mark_dirty(true, tx);
            return Ok(vec![pid]);
        }

        let page_no = self.append_empty_page()?;
        substrate_debug_log!(
            "[HeapFile::insert_tuple] table {} grew to page {}",
            self.id,
            page_no
        );
        let pid = PageId::new(self.id, page_no);
        let handle = pool.get_page(tx, pid, Permission::ReadWrite)?;
        let mut page = handle.write().unwrap();
        page.insert_tuple(tuple)?;
        page.mark_dirty(true, tx);
        Ok(vec![pid])
    }

    /// Deletes `tuple` from the page its record id names. Returns the
    /// dirtied page.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tx: TransactionId,
        tuple: &Tuple,
    ) -> Result<PageId> {
        let rid = tuple.record_id().ok_or(DbError::NotOnPage)?;
        let handle = pool.get_page(tx, rid.page_id, Permission::ReadWrite)?;
        let mut page = handle.write().unwrap();
        page.delete_tuple(tuple)?;
        page.mark_dirty(true, tx);
        Ok(rid.page_id)
    }

    /// A cursor over every stored tuple, reading pages through the buffer
    /// pool with read-only permission.
    pub fn cursor(self: &Arc<Self>, pool: Arc<BufferPool>, tx: TransactionId) -> HeapFileCursor {
        HeapFileCursor {
            file: self.clone(),
            pool,
            tx,
            next_page: 0,
            buffered: Vec::new().into_iter(),
            opened: false,
        }
    }
}

/// Walks a heap file page by page, buffering the stored tuples of the
/// current page.
pub struct HeapFileCursor {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tx: TransactionId,
    next_page: usize,
    buffered: std::vec::IntoIter<Tuple>,
    opened: bool,
}

impl HeapFileCursor {
    pub fn open(&mut self) {
        self.next_page = 0;
        self.buffered = Vec::new().into_iter();
        self.opened = true;
    }

    pub fn close(&mut self) {
        self.buffered = Vec::new().into_iter();
        self.opened = false;
    }

    pub fn rewind(&mut self) {
        self.close();
        self.open();
    }

    /// The next stored tuple, or `None` once every page is exhausted or the
    /// cursor is closed.
    pub fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.opened {
            return Ok(None);
        }
        loop {
            if let Some(tuple) = self.buffered.next() {
                return Ok(Some(tuple));
            }
            if self.next_page >= self.file.num_pages()? {
                return Ok(None);
            }
            let pid = PageId::new(self.file.id(), self.next_page);
            self.next_page += 1;
            let handle = self.pool.get_page(self.tx, pid, Permission::ReadOnly)?;
            let page = handle.read().unwrap();
            let tuples: Vec<Tuple> = page.iter().cloned().collect();
            self.buffered = tuples.into_iter();
        }
    }
}
