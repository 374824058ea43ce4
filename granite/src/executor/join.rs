use std::sync::Arc;

use substrate::field::CmpOp;
use substrate::tuple::{Tuple, TupleDesc};

use super::{not_open, Executor};
use crate::errors::Result;

/// Compares one field of the left tuple against one field of the right.
#[derive(Debug, Clone)]
pub struct JoinPredicate {
    left_field: usize,
    op: CmpOp,
    right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: CmpOp, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    pub fn filter(&self, left: &Tuple, right: &Tuple) -> bool {
        left.field(self.left_field)
            .compare(self.op, right.field(self.right_field))
    }
}

/// Nested-loop join.
///
/// For every left tuple the right child is played to exhaustion and then
/// rewound; matching pairs are emitted as the concatenation of the two
/// tuples under the merged schema.
pub struct Join {
    predicate: JoinPredicate,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    desc: Arc<TupleDesc>,
    current_left: Option<Tuple>,
    opened: bool,
}

impl Join {
    pub fn new(
        predicate: JoinPredicate,
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
    ) -> Self {
        let desc = Arc::new(TupleDesc::merge(left.tuple_desc(), right.tuple_desc()));
        Self {
            predicate,
            left,
            right,
            desc,
            current_left: None,
            opened: false,
        }
    }
}

impl Executor for Join {
    fn open(&mut self) -> Result<()> {
        self.left.open()?;
        self.right.open()?;
        self.current_left = None;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.current_left = None;
        self.opened = false;
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.opened {
            return Err(not_open("Join"));
        }
        self.left.rewind()?;
        self.right.rewind()?;
        self.current_left = None;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.opened {
            return Err(not_open("Join"));
        }
        loop {
            if self.current_left.is_none() {
                self.current_left = self.left.next()?;
                if self.current_left.is_none() {
                    return Ok(None);
                }
            }

            let left = self.current_left.as_ref().unwrap();
            while let Some(right) = self.right.next()? {
                if self.predicate.filter(left, &right) {
                    let merged = Tuple::merge(self.desc.clone(), left, &right)?;
                    return Ok(Some(merged));
                }
            }

            // inner exhausted: restart it and advance the outer
            self.right.rewind()?;
            self.current_left = None;
        }
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
