use std::sync::Arc;

use substrate::heap_file::{HeapFile, HeapFileCursor};
use substrate::transaction::TransactionId;
use substrate::tuple::{Tuple, TupleDesc};

use super::{not_open, Executor};
use crate::errors::Result;
use crate::Database;

/// Sequential scan over one table's heap file.
///
/// Pages are read through the buffer pool with read-only permission; the
/// locks taken stay with the transaction until it completes. With an alias,
/// every output column is renamed to `alias.column`.
pub struct SeqScan {
    file: Arc<HeapFile>,
    desc: TupleDesc,
    cursor: HeapFileCursor,
    opened: bool,
}

impl SeqScan {
    pub fn new(
        db: &Database,
        tx: TransactionId,
        table_id: u32,
        alias: Option<&str>,
    ) -> Result<Self> {
        let file = db.catalog().file(table_id)?;
        let desc = match alias {
            Some(alias) => file.desc().with_prefix(alias),
            None => (**file.desc()).clone(),
        };
        let cursor = file.cursor(db.buffer_pool().clone(), tx);
        Ok(Self {
            file,
            desc,
            cursor,
            opened: false,
        })
    }

    pub fn table_id(&self) -> u32 {
        self.file.id()
    }
}

impl Executor for SeqScan {
    fn open(&mut self) -> Result<()> {
        self.cursor.open();
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
        self.opened = false;
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.opened {
            return Err(not_open("SeqScan"));
        }
        self.cursor.rewind();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.opened {
            return Err(not_open("SeqScan"));
        }
        Ok(self.cursor.next()?)
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
