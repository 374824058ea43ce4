//! Per-table statistics used for selectivity and scan-cost estimation.

use std::collections::HashMap;
use std::sync::Arc;

use substrate::field::{CmpOp, Field, FieldType};
use substrate::tuple::TupleDesc;

use crate::errors::Result;
use crate::{granite_debug_log, Database};

pub mod histogram;

pub use histogram::{IntHistogram, StringHistogram};

/// Bins per column histogram.
pub const NUM_HIST_BINS: usize = 100;

/// Default cost charged per page of IO when none is specified.
pub const IO_COST_PER_PAGE: f64 = 1000.0;

/// Statistics about one base table: cardinality, page count, and one
/// histogram per column.
pub struct TableStats {
    desc: Arc<TupleDesc>,
    int_histograms: HashMap<usize, IntHistogram>,
    string_histograms: HashMap<usize, StringHistogram>,
    total_tuples: usize,
    num_pages: usize,
    io_cost_per_page: f64,
}

impl TableStats {
    /// Scans the table twice under a fresh transaction: the first pass finds
    /// per-column integer bounds and fills the string histograms, then the
    /// integer histograms are allocated and filled by the second pass. The
    /// transaction commits once the build finishes.
    pub fn build(db: &Database, table_id: u32, io_cost_per_page: f64) -> Result<Self> {
        let file = db.catalog().file(table_id)?;
        let desc = file.desc().clone();
        let tx = db.begin();
        granite_debug_log!("[TableStats::build] table {} under {}", table_id, tx);

        let scan = (|| -> Result<TableStats> {
            let mut mins: HashMap<usize, i32> = HashMap::new();
            let mut maxs: HashMap<usize, i32> = HashMap::new();
            let mut string_histograms: HashMap<usize, StringHistogram> = HashMap::new();
            let mut total_tuples = 0usize;

            let mut cursor = file.cursor(db.buffer_pool().clone(), tx);
            cursor.open();
            while let Some(tuple) = cursor.next()? {
                total_tuples += 1;
                for i in 0..desc.num_fields() {
                    match tuple.field(i) {
                        Field::Int(v) => {
                            let min = mins.entry(i).or_insert(*v);
                            *min = (*min).min(*v);
                            let max = maxs.entry(i).or_insert(*v);
                            *max = (*max).max(*v);
                        }
                        Field::Text(s) => {
                            string_histograms
                                .entry(i)
                                .or_insert_with(|| StringHistogram::new(NUM_HIST_BINS))
                                .add_value(s);
                        }
                    }
                }
            }

            let mut int_histograms: HashMap<usize, IntHistogram> = HashMap::new();
            for i in 0..desc.num_fields() {
                if desc.field_type(i) == FieldType::Int {
                    if let (Some(&min), Some(&max)) = (mins.get(&i), maxs.get(&i)) {
                        int_histograms.insert(i, IntHistogram::new(NUM_HIST_BINS, min, max));
                    }
                }
            }

            cursor.rewind();
            while let Some(tuple) = cursor.next()? {
                for (i, hist) in int_histograms.iter_mut() {
                    if let Field::Int(v) = tuple.field(*i) {
                        hist.add_value(*v);
                    }
                }
            }
            cursor.close();

            Ok(TableStats {
                desc: desc.clone(),
                int_histograms,
                string_histograms,
                total_tuples,
                num_pages: file.num_pages()?,
                io_cost_per_page,
            })
        })();

        match scan {
            Ok(stats) => {
                db.commit(tx)?;
                Ok(stats)
            }
            Err(err) => {
                let _ = db.abort(tx);
                Err(err)
            }
        }
    }

    /// Cost of scanning the whole table once, assuming no cached pages and
    /// page-granular IO.
    pub fn estimate_scan_cost(&self) -> f64 {
        self.num_pages as f64 * self.io_cost_per_page * 2.0
    }

    /// Expected tuple count after applying a predicate with the given
    /// selectivity.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.total_tuples as f64 * selectivity) as usize
    }

    /// Expected selectivity of `field op ?` when the operand is unknown.
    pub fn avg_selectivity(&self, field: usize, _op: CmpOp) -> f64 {
        match self.desc.field_type(field) {
            FieldType::Int => self
                .int_histograms
                .get(&field)
                .map(|h| h.avg_selectivity())
                .unwrap_or(0.0),
            FieldType::Text => self
                .string_histograms
                .get(&field)
                .map(|h| h.avg_selectivity())
                .unwrap_or(0.0),
        }
    }

    /// Estimated selectivity of `field op constant`.
    pub fn estimate_selectivity(&self, field: usize, op: CmpOp, constant: &Field) -> f64 {
        match (self.desc.field_type(field), constant) {
            (FieldType::Int, Field::Int(v)) => self
                .int_histograms
                .get(&field)
                .map(|h| h.estimate_selectivity(op, *v))
                .unwrap_or(0.0),
            (FieldType::Text, Field::Text(s)) => self
                .string_histograms
                .get(&field)
                .map(|h| h.estimate_selectivity(op, s))
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn total_tuples(&self) -> usize {
        self.total_tuples
    }
}
