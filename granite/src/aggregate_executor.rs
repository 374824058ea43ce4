//! The aggregation operator and its per-type accumulators.

use std::collections::HashMap;
use std::sync::Arc;

use substrate::field::{Field, FieldType};
use substrate::tuple::{Tuple, TupleDesc};

use crate::errors::{ExecutionError, Result};
use crate::executor::{not_open, Executor};

/// The supported aggregation operators.
///
/// `SumCount` and `ScAvg` are declared for planner compatibility but not
/// implemented; selecting them fails with an invalid-aggregate error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
    SumCount,
    ScAvg,
}

impl std::fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
            AggregateOp::SumCount => "sum_count",
            AggregateOp::ScAvg => "sc_avg",
        };
        write!(f, "{}", name)
    }
}

fn group_agg_desc(gtype: Option<FieldType>) -> Arc<TupleDesc> {
    match gtype {
        Some(gtype) => Arc::new(TupleDesc::named(vec![
            (gtype, "groupVal"),
            (FieldType::Int, "aggVal"),
        ])),
        None => Arc::new(TupleDesc::named(vec![(FieldType::Int, "aggVal")])),
    }
}

#[derive(Debug, Clone)]
struct GroupAcc {
    total: i64,
    count: i64,
}

impl GroupAcc {
    fn seed(value: i64) -> Self {
        Self {
            total: value,
            count: 1,
        }
    }

    fn update(&mut self, op: AggregateOp, value: i64) {
        match op {
            AggregateOp::Min => self.total = self.total.min(value),
            AggregateOp::Max => self.total = self.total.max(value),
            AggregateOp::Sum => self.total += value,
            AggregateOp::Avg => {
                self.total += value;
                self.count += 1;
            }
            AggregateOp::Count => self.count += 1,
            AggregateOp::SumCount | AggregateOp::ScAvg => {}
        }
    }

    fn result(&self, op: AggregateOp) -> i64 {
        match op {
            AggregateOp::Avg => self.total / self.count,
            AggregateOp::Count => self.count,
            _ => self.total,
        }
    }
}

/// Folds integer fields into per-group summaries. Supports every
/// implemented operator.
pub struct IntegerAggregator {
    gfield: Option<usize>,
    afield: usize,
    op: AggregateOp,
    groups: HashMap<Option<Field>, GroupAcc>,
    desc: Arc<TupleDesc>,
}

impl IntegerAggregator {
    pub fn new(
        gfield: Option<usize>,
        gtype: Option<FieldType>,
        afield: usize,
        op: AggregateOp,
    ) -> Self {
        Self {
            gfield,
            afield,
            op,
            groups: HashMap::new(),
            desc: group_agg_desc(gtype),
        }
    }

    pub fn merge(&mut self, tuple: &Tuple) -> Result<()> {
        let value = match tuple.field(self.afield) {
            Field::Int(v) => *v as i64,
            other => {
                return Err(ExecutionError::Generic(format!(
                    "integer aggregator fed a {} field",
                    other.field_type()
                )))
            }
        };
        let key = self.gfield.map(|g| tuple.field(g).clone());
        match self.groups.get_mut(&key) {
            Some(acc) => acc.update(self.op, value),
            None => {
                let seed = GroupAcc::seed(value);
                self.groups.insert(key, seed);
            }
        }
        Ok(())
    }

    /// The accumulated `(groupVal, aggVal)` tuples. Group order is
    /// unspecified.
    pub fn results(&self) -> Result<Vec<Tuple>> {
        let mut out = Vec::with_capacity(self.groups.len());
        for (key, acc) in &self.groups {
            let agg_val = Field::Int(acc.result(self.op) as i32);
            let fields = match key {
                Some(group) => vec![group.clone(), agg_val],
                None => vec![agg_val],
            };
            out.push(Tuple::new(self.desc.clone(), fields)?);
        }
        Ok(out)
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}

/// Folds string fields into per-group summaries. Only `Count` is defined
/// over strings.
pub struct StringAggregator {
    gfield: Option<usize>,
    groups: HashMap<Option<Field>, i64>,
    desc: Arc<TupleDesc>,
}

impl StringAggregator {
    pub fn new(
        gfield: Option<usize>,
        gtype: Option<FieldType>,
        _afield: usize,
        op: AggregateOp,
    ) -> Result<Self> {
        if op != AggregateOp::Count {
            return Err(ExecutionError::InvalidAggregate(format!(
                "{} over a string field",
                op
            )));
        }
        Ok(Self {
            gfield,
            groups: HashMap::new(),
            desc: group_agg_desc(gtype),
        })
    }

    pub fn merge(&mut self, tuple: &Tuple) {
        let key = self.gfield.map(|g| tuple.field(g).clone());
        *self.groups.entry(key).or_insert(0) += 1;
    }

    pub fn results(&self) -> Result<Vec<Tuple>> {
        let mut out = Vec::with_capacity(self.groups.len());
        for (key, count) in &self.groups {
            let agg_val = Field::Int(*count as i32);
            let fields = match key {
                Some(group) => vec![group.clone(), agg_val],
                None => vec![agg_val],
            };
            out.push(Tuple::new(self.desc.clone(), fields)?);
        }
        Ok(out)
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}

enum Aggregator {
    Int(IntegerAggregator),
    Str(StringAggregator),
}

impl Aggregator {
    fn merge(&mut self, tuple: &Tuple) -> Result<()> {
        match self {
            Aggregator::Int(agg) => agg.merge(tuple),
            Aggregator::Str(agg) => {
                agg.merge(tuple);
                Ok(())
            }
        }
    }

    fn results(&self) -> Result<Vec<Tuple>> {
        match self {
            Aggregator::Int(agg) => agg.results(),
            Aggregator::Str(agg) => agg.results(),
        }
    }
}

/// Computes one aggregate over one column of its child, optionally grouped
/// by another column.
///
/// The whole child is consumed on `open`; afterwards the operator iterates
/// a materialized result set it owns outright, so no reference back into
/// the accumulator is kept.
pub struct Aggregate {
    child: Box<dyn Executor>,
    afield: usize,
    gfield: Option<usize>,
    op: AggregateOp,
    desc: Arc<TupleDesc>,
    results: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl std::fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregate")
            .field("afield", &self.afield)
            .field("gfield", &self.gfield)
            .field("op", &self.op)
            .field("desc", &self.desc)
            .field("results", &self.results)
            .field("cursor", &self.cursor)
            .field("opened", &self.opened)
            .finish_non_exhaustive()
    }
}

impl Aggregate {
    pub fn new(
        child: Box<dyn Executor>,
        afield: usize,
        gfield: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self> {
        if matches!(op, AggregateOp::SumCount | AggregateOp::ScAvg) {
            return Err(ExecutionError::InvalidAggregate(format!(
                "{} is not implemented",
                op
            )));
        }
        let child_desc = child.tuple_desc();
        let gtype = gfield.map(|g| child_desc.field_type(g));
        // fail on string + non-count up front rather than mid-stream
        if child_desc.field_type(afield) == FieldType::Text && op != AggregateOp::Count {
            return Err(ExecutionError::InvalidAggregate(format!(
                "{} over a string field",
                op
            )));
        }
        let desc = group_agg_desc(gtype);
        Ok(Self {
            child,
            afield,
            gfield,
            op,
            desc,
            results: Vec::new(),
            cursor: 0,
            opened: false,
        })
    }

    fn build_aggregator(&self) -> Result<Aggregator> {
        let child_desc = self.child.tuple_desc();
        let gtype = self.gfield.map(|g| child_desc.field_type(g));
        Ok(match child_desc.field_type(self.afield) {
            FieldType::Int => Aggregator::Int(IntegerAggregator::new(
                self.gfield,
                gtype,
                self.afield,
                self.op,
            )),
            FieldType::Text => Aggregator::Str(StringAggregator::new(
                self.gfield,
                gtype,
                self.afield,
                self.op,
            )?),
        })
    }
}

impl Executor for Aggregate {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        let mut aggregator = self.build_aggregator()?;
        while let Some(tuple) = self.child.next()? {
            aggregator.merge(&tuple)?;
        }
        self.results = aggregator.results()?;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results.clear();
        self.cursor = 0;
        self.opened = false;
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.opened {
            return Err(not_open("Aggregate"));
        }
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.opened {
            return Err(not_open("Aggregate"));
        }
        match self.results.get(self.cursor) {
            Some(tuple) => {
                self.cursor += 1;
                Ok(Some(tuple.clone()))
            }
            None => Ok(None),
        }
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
