//! # Granite
//! The relational layer of the Granite database: a pull-based executor
//! algebra, aggregators, and per-table statistics over the `substrate`
//! storage engine.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use substrate::buffer_pool::BufferPool;
use substrate::catalog::Catalog;
use substrate::log::LogFile;
use substrate::transaction::{TransactionId, TransactionManager};
use substrate::DEFAULT_CACHE_PAGES;

pub mod aggregate_executor;
pub mod errors;
pub mod executor;
pub mod optimizer;

use errors::Result;
use optimizer::TableStats;

pub fn debug_logs_enabled() -> bool {
    std::env::var_os("GRANITE_DEBUG_LOG").is_some()
}

#[macro_export]
macro_rules! granite_debug_log {
    ($($arg:tt)*) => {
        if $crate::debug_logs_enabled() {
            println!($($arg)*);
        }
    };
}

/// The database context: owner of the catalog, buffer pool, transaction
/// manager, and statistics registry.
///
/// One value per database instance; it is threaded explicitly through
/// operators instead of living in process-global state, so tests can build
/// a fresh context per case.
pub struct Database {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
    tx_manager: TransactionManager,
    stats: Mutex<HashMap<u32, Arc<TableStats>>>,
}

impl Database {
    /// Builds a context with an explicit buffer pool capacity. The log file
    /// at `log_path` backs the commit path.
    pub fn with_cache_pages<P: AsRef<Path>>(log_path: P, cache_pages: usize) -> Result<Self> {
        let catalog = Arc::new(Catalog::new());
        let log = LogFile::open(log_path).map_err(substrate::error::DbError::Io)?;
        let buffer_pool = Arc::new(BufferPool::new(cache_pages, catalog.clone(), log));
        Ok(Self {
            catalog,
            buffer_pool,
            tx_manager: TransactionManager::new(),
            stats: Mutex::new(HashMap::new()),
        })
    }

    pub fn new<P: AsRef<Path>>(log_path: P) -> Result<Self> {
        Self::with_cache_pages(log_path, DEFAULT_CACHE_PAGES)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    pub fn begin(&self) -> TransactionId {
        self.tx_manager.begin()
    }

    pub fn commit(&self, tx: TransactionId) -> Result<()> {
        granite_debug_log!("[Database::commit] {}", tx);
        Ok(self.buffer_pool.transaction_complete(tx, true)?)
    }

    pub fn abort(&self, tx: TransactionId) -> Result<()> {
        granite_debug_log!("[Database::abort] {}", tx);
        Ok(self.buffer_pool.transaction_complete(tx, false)?)
    }

    /// Statistics for the table, computed on first use and cached for the
    /// lifetime of the context.
    pub fn table_stats(&self, table_id: u32, io_cost_per_page: f64) -> Result<Arc<TableStats>> {
        if let Some(stats) = self.stats.lock().unwrap().get(&table_id) {
            return Ok(stats.clone());
        }
        let stats = Arc::new(TableStats::build(self, table_id, io_cost_per_page)?);
        self.stats
            .lock()
            .unwrap()
            .insert(table_id, stats.clone());
        Ok(stats)
    }

    /// Drops cached statistics so the next use recomputes them.
    pub fn invalidate_stats(&self, table_id: u32) {
        self.stats.lock().unwrap().remove(&table_id);
    }
}
