use std::sync::atomic::{AtomicU64, Ordering};

/// A transaction identifier. Ids are unique within one database process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Vends transaction ids. Commit and abort are handled by the buffer pool,
/// which owns the dirty pages and locks a transaction leaves behind.
#[derive(Debug, Default)]
pub struct TransactionManager {
    next_transaction_id: AtomicU64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> TransactionId {
        TransactionId(self.next_transaction_id.fetch_add(1, Ordering::SeqCst))
    }
}
