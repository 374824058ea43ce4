//! Manages the buffer pool, a bounded LRU cache of heap pages shared by
//! every transaction in the process.

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use rand::Rng;

use crate::catalog::Catalog;
use crate::error::{DbError, Result};
use crate::heap_page::HeapPage;
use crate::lock_manager::{LockManager, LockMode};
use crate::log::LogFile;
use crate::transaction::TransactionId;
use crate::tuple::Tuple;
use crate::{substrate_debug_log, PageId};

/// How long a page request may wait on a lock before its transaction is
/// aborted. Deadlocks resolve through this deadline.
const LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Base pause between lock attempts; a small random jitter is added so
/// symmetric waiters fall out of step.
const LOCK_RETRY: Duration = Duration::from_millis(5);

/// The permission a transaction requests on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    fn lock_mode(self) -> LockMode {
        match self {
            Permission::ReadOnly => LockMode::Shared,
            Permission::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// A shared handle to a cached page.
pub type PageHandle = Arc<RwLock<HeapPage>>;

/// The buffer pool manager.
///
/// Pages enter through [`BufferPool::get_page`], which takes the page lock
/// for the calling transaction before touching the cache. Dirty pages are
/// pinned in memory until their transaction completes (NO-STEAL), and a
/// commit forces every one of them to disk (FORCE).
pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    log: Mutex<LogFile>,
    // Invariant: the cache mutex is never taken while holding a page guard.
    cache: Mutex<LruCache<PageId, PageHandle>>,
}

impl BufferPool {
    pub fn new(capacity: usize, catalog: Arc<Catalog>, log: LogFile) -> Self {
        assert!(capacity > 0, "buffer pool needs at least one page");
        Self {
            capacity,
            catalog,
            lock_manager: LockManager::new(),
            log: Mutex::new(log),
            cache: Mutex::new(LruCache::unbounded()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retrieves the page with the requested permission.
    ///
    /// Polls the lock manager until the lock is granted or the deadline
    /// passes; a timed-out wait aborts the transaction. A cached page is
    /// returned as-is (promoted to most recently used); otherwise the page
    /// is read from its heap file and cached, evicting if needed.
    pub fn get_page(&self, tx: TransactionId, pid: PageId, perm: Permission) -> Result<PageHandle> {
        let mode = perm.lock_mode();
        let deadline = Instant::now() + LOCK_TIMEOUT;
        while !self.lock_manager.try_lock(tx, pid, mode) {
            if Instant::now() >= deadline {
                substrate_debug_log!("[BufferPool::get_page] {} timed out on {}", tx, pid);
                return Err(DbError::TransactionAborted);
            }
            let jitter = rand::thread_rng().gen_range(0..5);
            std::thread::sleep(LOCK_RETRY + Duration::from_millis(jitter));
        }

        let mut cache = self.cache.lock().unwrap();
        if let Some(handle) = cache.get(&pid) {
            return Ok(handle.clone());
        }

        let file = self.catalog.file(pid.table_id)?;
        let page = file.read_page(pid)?;
        let handle = Arc::new(RwLock::new(page));
        self.cache_put(&mut cache, pid, handle.clone())?;
        Ok(handle)
    }

    /// Inserts the cached entry, evicting the least recently used clean page
    /// when the pool is full. Eviction never chooses a dirty page; when every
    /// page is dirty the insert fails instead.
    fn cache_put(
        &self,
        cache: &mut LruCache<PageId, PageHandle>,
        pid: PageId,
        handle: PageHandle,
    ) -> Result<()> {
        if !cache.contains(&pid) && cache.len() >= self.capacity {
            let victim = cache
                .iter()
                .rev()
                .find(|(_, h)| {
                    h.try_read()
                        .map(|page| page.is_dirty().is_none())
                        .unwrap_or(false)
                })
                .map(|(k, _)| *k);
            match victim {
                Some(key) => {
                    substrate_debug_log!("[BufferPool] evicting clean page {}", key);
                    cache.pop(&key);
                }
                None => return Err(DbError::CacheFull),
            }
        }
        cache.put(pid, handle);
        Ok(())
    }

    /// Adds a tuple to the named table, marking every dirtied page and
    /// keeping it cached so future readers observe the mutation.
    pub fn insert_tuple(&self, tx: TransactionId, table_id: u32, tuple: Tuple) -> Result<()> {
        let file = self.catalog.file(table_id)?;
        let dirtied = file.insert_tuple(self, tx, tuple)?;
        self.note_dirty(tx, &dirtied)
    }

    /// Removes the tuple from the table its record id names.
    pub fn delete_tuple(&self, tx: TransactionId, tuple: &Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(DbError::NotOnPage)?;
        let file = self.catalog.file(rid.page_id.table_id)?;
        let dirtied = file.delete_tuple(self, tx, tuple)?;
        self.note_dirty(tx, &[dirtied])
    }

    fn note_dirty(&self, tx: TransactionId, pids: &[PageId]) -> Result<()> {
        let mut handles = Vec::with_capacity(pids.len());
        {
            let mut cache = self.cache.lock().unwrap();
            for pid in pids {
                match cache.get(pid) {
                    Some(handle) => handles.push(handle.clone()),
                    None => {
                        return Err(DbError::Generic(format!(
                            "dirtied page {} fell out of the cache",
                            pid
                        )))
                    }
                }
            }
        }
        for handle in handles {
            handle.write().unwrap().mark_dirty(true, tx);
        }
        Ok(())
    }

    /// Commits or aborts a transaction and releases all of its locks.
    ///
    /// Commit forces every page the transaction dirtied to disk, logging a
    /// before/after image pair first. Abort re-reads each dirtied page from
    /// disk, replacing the cached copy in place so outstanding handles see
    /// the restored content.
    pub fn transaction_complete(&self, tx: TransactionId, commit: bool) -> Result<()> {
        let result: Result<()> = (|| {
            if commit {
                self.flush_pages(tx)?;
                self.log.lock().unwrap().log_commit(tx.raw())?;
            } else {
                self.revert_pages(tx)?;
                self.log.lock().unwrap().log_abort(tx.raw())?;
            }
            Ok(())
        })();
        self.lock_manager.unlock_all(tx);
        result
    }

    fn snapshot_entries(&self) -> Vec<(PageId, PageHandle)> {
        let cache = self.cache.lock().unwrap();
        cache
            .iter()
            .map(|(pid, handle)| (*pid, handle.clone()))
            .collect()
    }

    /// Forces every page dirtied by `tx` to disk.
    fn flush_pages(&self, tx: TransactionId) -> Result<()> {
        for (pid, handle) in self.snapshot_entries() {
            let mut page = handle.write().unwrap();
            if page.is_dirty() != Some(tx) {
                continue;
            }
            self.force_page(pid, &mut page)?;
        }
        Ok(())
    }

    /// Logs and writes one dirty page, then starts its next before-image.
    fn force_page(&self, pid: PageId, page: &mut HeapPage) -> Result<()> {
        let tx = match page.is_dirty() {
            Some(tx) => tx,
            None => return Ok(()),
        };
        substrate_debug_log!("[BufferPool] flushing {} for {}", pid, tx);
        let before = page.before_image_data().to_vec();
        let after = page.serialize();
        self.log
            .lock()
            .unwrap()
            .log_write(tx.raw(), pid, before, after)?;
        let file = self.catalog.file(pid.table_id)?;
        file.write_page(page)?;
        page.set_before_image();
        Ok(())
    }

    /// Discards the in-memory modifications of every page dirtied by `tx`.
    fn revert_pages(&self, tx: TransactionId) -> Result<()> {
        for (pid, handle) in self.snapshot_entries() {
            let mut page = handle.write().unwrap();
            if page.is_dirty() != Some(tx) {
                continue;
            }
            substrate_debug_log!("[BufferPool] reverting {} for {}", pid, tx);
            let file = self.catalog.file(pid.table_id)?;
            *page = file.read_page(pid)?;
        }
        Ok(())
    }

    /// Flushes every dirty page regardless of owner. Breaks NO-STEAL
    /// guarantees for in-flight transactions; callers are expected to be
    /// quiescing the database.
    pub fn flush_all_pages(&self) -> Result<()> {
        for (pid, handle) in self.snapshot_entries() {
            let mut page = handle.write().unwrap();
            self.force_page(pid, &mut page)?;
        }
        Ok(())
    }

    /// Drops the page from the cache without writing it.
    pub fn remove_page(&self, pid: PageId) {
        self.cache.lock().unwrap().pop(&pid);
    }

    pub fn holds_lock(&self, tx: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tx, pid)
    }

    #[cfg(test)]
    fn cached_page_ids(&self) -> Vec<PageId> {
        self.cache.lock().unwrap().iter().map(|(pid, _)| *pid).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldType};
    use crate::heap_file::HeapFile;
    use crate::transaction::TransactionManager;
    use crate::tuple::TupleDesc;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        pool: Arc<BufferPool>,
        tm: TransactionManager,
        table_id: u32,
        desc: Arc<TupleDesc>,
    }

    fn fixture(capacity: usize, preallocated_pages: usize) -> Fixture {
        let dir = tempdir().unwrap();
        let desc = Arc::new(TupleDesc::named(vec![
            (FieldType::Int, "a"),
            (FieldType::Int, "b"),
        ]));
        let file = HeapFile::open(dir.path().join("t.dat"), desc.clone()).unwrap();
        if preallocated_pages > 0 {
            let zeros = HeapPage::empty_page_data();
            let mut content = Vec::new();
            for _ in 0..preallocated_pages {
                content.extend_from_slice(&zeros);
            }
            std::fs::write(file.path(), content).unwrap();
        }

        let catalog = Arc::new(Catalog::new());
        let table_id = catalog.add_table(Arc::new(file), "t", "a");
        let log = LogFile::open(dir.path().join("db.log")).unwrap();
        Fixture {
            _dir: dir,
            pool: Arc::new(BufferPool::new(capacity, catalog, log)),
            tm: TransactionManager::new(),
            table_id,
            desc,
        }
    }

    fn pair(fx: &Fixture, a: i32, b: i32) -> Tuple {
        Tuple::new(fx.desc.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap()
    }

    #[test]
    fn cached_page_is_reused() {
        let fx = fixture(4, 1);
        let tx = fx.tm.begin();
        let pid = PageId::new(fx.table_id, 0);
        let first = fx.pool.get_page(tx, pid, Permission::ReadOnly).unwrap();
        let second = fx.pool.get_page(tx, pid, Permission::ReadOnly).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn lru_promotion_prevents_eviction_of_hot_page() {
        let fx = fixture(2, 3);
        let tx = fx.tm.begin();
        let p0 = PageId::new(fx.table_id, 0);
        let p1 = PageId::new(fx.table_id, 1);
        let p2 = PageId::new(fx.table_id, 2);

        fx.pool.get_page(tx, p0, Permission::ReadOnly).unwrap();
        fx.pool.get_page(tx, p1, Permission::ReadOnly).unwrap();
        // touch p0 again so p1 becomes the LRU entry
        fx.pool.get_page(tx, p0, Permission::ReadOnly).unwrap();
        fx.pool.get_page(tx, p2, Permission::ReadOnly).unwrap();

        let cached = fx.pool.cached_page_ids();
        assert!(cached.contains(&p0));
        assert!(!cached.contains(&p1));
        assert!(cached.contains(&p2));
    }

    #[test]
    fn full_cache_of_dirty_pages_rejects_new_entries() {
        let fx = fixture(1, 2);
        let tx = fx.tm.begin();
        fx.pool.insert_tuple(tx, fx.table_id, pair(&fx, 1, 1)).unwrap();

        // page 0 is dirty and the pool holds one page, so page 1 cannot enter
        let err = fx
            .pool
            .get_page(tx, PageId::new(fx.table_id, 1), Permission::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, DbError::CacheFull));
    }

    #[test]
    fn commit_writes_pages_and_clears_dirty_bits() {
        let fx = fixture(4, 0);
        let tx = fx.tm.begin();
        fx.pool.insert_tuple(tx, fx.table_id, pair(&fx, 1, 2)).unwrap();
        fx.pool.transaction_complete(tx, true).unwrap();

        let pid = PageId::new(fx.table_id, 0);
        let file = fx.pool.catalog.file(fx.table_id).unwrap();
        let on_disk = file.read_page(pid).unwrap();
        assert_eq!(on_disk.iter().count(), 1);

        let tx2 = fx.tm.begin();
        let handle = fx.pool.get_page(tx2, pid, Permission::ReadOnly).unwrap();
        assert!(handle.read().unwrap().is_dirty().is_none());
    }

    #[test]
    fn abort_restores_page_from_disk() {
        let fx = fixture(4, 0);
        let setup = fx.tm.begin();
        fx.pool
            .insert_tuple(setup, fx.table_id, pair(&fx, 1, 1))
            .unwrap();
        fx.pool.transaction_complete(setup, true).unwrap();

        let tx = fx.tm.begin();
        fx.pool.insert_tuple(tx, fx.table_id, pair(&fx, 2, 2)).unwrap();
        fx.pool.transaction_complete(tx, false).unwrap();

        let tx2 = fx.tm.begin();
        let pid = PageId::new(fx.table_id, 0);
        let handle = fx.pool.get_page(tx2, pid, Permission::ReadOnly).unwrap();
        let page = handle.read().unwrap();
        assert_eq!(page.iter().count(), 1);
        assert!(page.is_dirty().is_none());
    }

    #[test]
    fn commit_logs_write_and_commit_records() {
        let fx = fixture(4, 0);
        let tx = fx.tm.begin();
        fx.pool.insert_tuple(tx, fx.table_id, pair(&fx, 5, 6)).unwrap();
        fx.pool.transaction_complete(tx, true).unwrap();

        let records = fx.pool.log.lock().unwrap().records().unwrap();
        assert!(records.iter().any(|r| matches!(
            r,
            crate::log::LogRecord::Write { tx: t, .. } if *t == tx.raw()
        )));
        assert!(records.iter().any(|r| matches!(
            r,
            crate::log::LogRecord::Commit { tx: t } if *t == tx.raw()
        )));
    }

    #[test]
    fn locks_are_released_on_completion() {
        let fx = fixture(4, 1);
        let tx = fx.tm.begin();
        let pid = PageId::new(fx.table_id, 0);
        fx.pool.get_page(tx, pid, Permission::ReadWrite).unwrap();
        assert!(fx.pool.holds_lock(tx, pid));

        fx.pool.transaction_complete(tx, true).unwrap();
        assert!(!fx.pool.holds_lock(tx, pid));

        let tx2 = fx.tm.begin();
        fx.pool.get_page(tx2, pid, Permission::ReadWrite).unwrap();
    }
}
