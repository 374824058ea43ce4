//! The pull-based executor algebra.
//!
//! Every operator is a node in a query tree that owns its children. The
//! lifecycle is `open -> next* -> close`; `rewind` resets an open operator
//! back to its first tuple. `next` yields `None` at end of stream and is
//! only defined while the operator is open.

use substrate::tuple::{Tuple, TupleDesc};

use crate::errors::Result;

mod dml;
mod filter;
mod join;
mod scan;

pub use dml::{Delete, Insert};
pub use filter::{Filter, Predicate};
pub use join::{Join, JoinPredicate};
pub use scan::SeqScan;

/// A pull iterator over tuples.
pub trait Executor {
    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    /// Resets an open operator to the start of its stream.
    fn rewind(&mut self) -> Result<()>;

    /// The next tuple, or `None` once the stream is exhausted.
    fn next(&mut self) -> Result<Option<Tuple>>;

    /// The schema of the tuples this operator produces.
    fn tuple_desc(&self) -> &TupleDesc;
}

pub(crate) fn not_open(op: &str) -> crate::errors::ExecutionError {
    crate::errors::ExecutionError::Generic(format!("{} is not open", op))
}
