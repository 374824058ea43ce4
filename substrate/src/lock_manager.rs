//! Manages page-level locks for strict two-phase locking.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::transaction::TransactionId;
use crate::PageId;

/// Represents the different modes of locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// The main lock manager struct.
///
/// Grants are decided without blocking: `try_lock` reports whether the lock
/// was granted right now, and callers poll it under their own deadline.
/// Deadlocks therefore resolve by timeout, never by a waits-for graph.
#[derive(Debug, Default)]
pub struct LockManager {
    /// The table mapping each page to its current holders and their modes.
    lock_table: Mutex<HashMap<PageId, HashMap<TransactionId, LockMode>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to take `mode` on `pid` for `tx`, returning whether the lock
    /// is held after the call.
    ///
    /// Re-requesting a held mode is idempotent. A shared holder upgrades to
    /// exclusive only while it is the sole holder. An exclusive holder may
    /// always downgrade to shared.
    pub fn try_lock(&self, tx: TransactionId, pid: PageId, mode: LockMode) -> bool {
        let mut lock_table = self.lock_table.lock().unwrap();
        let holders = lock_table.entry(pid).or_default();

        match holders.get(&tx).copied() {
            Some(held) if held == mode => true,
            Some(LockMode::Shared) => {
                // upgrade: only while no one else holds the page
                if holders.len() == 1 {
                    holders.insert(tx, LockMode::Exclusive);
                    true
                } else {
                    false
                }
            }
            Some(LockMode::Exclusive) => {
                // downgrade
                holders.insert(tx, LockMode::Shared);
                true
            }
            None => match mode {
                LockMode::Shared => {
                    let blocked = holders.values().any(|&m| m == LockMode::Exclusive);
                    if blocked {
                        false
                    } else {
                        holders.insert(tx, LockMode::Shared);
                        true
                    }
                }
                LockMode::Exclusive => {
                    if holders.is_empty() {
                        holders.insert(tx, LockMode::Exclusive);
                        true
                    } else {
                        false
                    }
                }
            },
        }
    }

    pub fn holds_lock(&self, tx: TransactionId, pid: PageId) -> bool {
        let lock_table = self.lock_table.lock().unwrap();
        lock_table
            .get(&pid)
            .map_or(false, |holders| holders.contains_key(&tx))
    }

    /// Releases `tx`'s lock on `pid`, dropping the page entry when it
    /// becomes empty.
    pub fn unlock(&self, tx: TransactionId, pid: PageId) {
        let mut lock_table = self.lock_table.lock().unwrap();
        if let Some(holders) = lock_table.get_mut(&pid) {
            holders.remove(&tx);
            if holders.is_empty() {
                lock_table.remove(&pid);
            }
        }
    }

    /// Releases every lock held by `tx`.
    pub fn unlock_all(&self, tx: TransactionId) {
        let mut lock_table = self.lock_table.lock().unwrap();
        lock_table.retain(|_, holders| {
            holders.remove(&tx);
            !holders.is_empty()
        });
    }
}
