use substrate::field::{CmpOp, Field};
use substrate::tuple::{Tuple, TupleDesc};

use super::{not_open, Executor};
use crate::errors::Result;

/// Compares one field of a tuple against a constant.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: CmpOp,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: CmpOp, operand: Field) -> Self {
        Self { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> CmpOp {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// Whether the tuple satisfies `tuple[field] op operand`.
    pub fn filter(&self, tuple: &Tuple) -> bool {
        tuple.field(self.field).compare(self.op, &self.operand)
    }
}

/// Passes through the child tuples that satisfy a predicate.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn Executor>,
    opened: bool,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn Executor>) -> Self {
        Self {
            predicate,
            child,
            opened: false,
        }
    }
}

impl Executor for Filter {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.opened {
            return Err(not_open("Filter"));
        }
        self.child.rewind()
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.opened {
            return Err(not_open("Filter"));
        }
        while let Some(tuple) = self.child.next()? {
            if self.predicate.filter(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn tuple_desc(&self) -> &TupleDesc {
        self.child.tuple_desc()
    }
}
