use std::sync::Arc;

use substrate::buffer_pool::BufferPool;
use substrate::error::DbError;
use substrate::field::{Field, FieldType};
use substrate::transaction::TransactionId;
use substrate::tuple::{Tuple, TupleDesc};

use super::{not_open, Executor};
use crate::errors::Result;
use crate::Database;

/// Drains its child into a table through the buffer pool.
///
/// One-shot: the first `next` performs every insert and reports the count
/// in a single-field tuple named `insertNums`; later calls yield `None`.
pub struct Insert {
    pool: Arc<BufferPool>,
    tx: TransactionId,
    child: Box<dyn Executor>,
    table_id: u32,
    desc: Arc<TupleDesc>,
    done: bool,
    opened: bool,
}

impl Insert {
    pub fn new(
        db: &Database,
        tx: TransactionId,
        child: Box<dyn Executor>,
        table_id: u32,
    ) -> Result<Self> {
        let table_desc = db.catalog().desc(table_id)?;
        if *child.tuple_desc() != *table_desc {
            return Err(DbError::SchemaMismatch(format!(
                "cannot insert ({}) into table with schema ({})",
                child.tuple_desc(),
                table_desc
            ))
            .into());
        }
        Ok(Self {
            pool: db.buffer_pool().clone(),
            tx,
            child,
            table_id,
            desc: Arc::new(TupleDesc::named(vec![(FieldType::Int, "insertNums")])),
            done: false,
            opened: false,
        })
    }
}

impl Executor for Insert {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.done = false;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.opened {
            return Err(not_open("Insert"));
        }
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.opened {
            return Err(not_open("Insert"));
        }
        if self.done {
            return Ok(None);
        }
        let mut count = 0i32;
        while let Some(tuple) = self.child.next()? {
            self.pool.insert_tuple(self.tx, self.table_id, tuple)?;
            count += 1;
        }
        self.done = true;
        Ok(Some(Tuple::new(self.desc.clone(), vec![Field::Int(count)])?))
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}

/// Deletes every tuple its child produces.
///
/// The target table comes from each tuple's record id, so the child must
/// yield stored tuples (a scan, possibly filtered). One-shot like [`Insert`];
/// the count tuple is named `deleteNums`.
pub struct Delete {
    pool: Arc<BufferPool>,
    tx: TransactionId,
    child: Box<dyn Executor>,
    desc: Arc<TupleDesc>,
    done: bool,
    opened: bool,
}

impl Delete {
    pub fn new(db: &Database, tx: TransactionId, child: Box<dyn Executor>) -> Self {
        Self {
            pool: db.buffer_pool().clone(),
            tx,
            child,
            desc: Arc::new(TupleDesc::named(vec![(FieldType::Int, "deleteNums")])),
            done: false,
            opened: false,
        }
    }
}

impl Executor for Delete {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.done = false;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.opened {
            return Err(not_open("Delete"));
        }
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.opened {
            return Err(not_open("Delete"));
        }
        if self.done {
            return Ok(None);
        }
        let mut count = 0i32;
        while let Some(tuple) = self.child.next()? {
            self.pool.delete_tuple(self.tx, &tuple)?;
            count += 1;
        }
        self.done = true;
        Ok(Some(Tuple::new(self.desc.clone(), vec![Field::Int(count)])?))
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
