use substrate::field::CmpOp;

/// An equi-width histogram over one integer column.
///
/// Space and update time are constant in the number of values seen; only
/// per-bucket counts are kept.
#[derive(Debug, Clone)]
pub struct IntHistogram {
    buckets: Vec<i64>,
    min: i32,
    max: i32,
    ntups: i64,
    width: f64,
}

impl IntHistogram {
    /// `min` and `max` bound every value the histogram will ever receive.
    pub fn new(buckets: usize, min: i32, max: i32) -> Self {
        assert!(buckets > 0, "a histogram needs at least one bucket");
        let width = ((max as f64 - min as f64 + 1.0) / buckets as f64).max(1.0);
        Self {
            buckets: vec![0; buckets],
            min,
            max,
            ntups: 0,
            width,
        }
    }

    fn index_of(&self, v: i32) -> Option<usize> {
        if v < self.min || v > self.max {
            return None;
        }
        let index = ((v - self.min) as f64 / self.width) as usize;
        if index >= self.buckets.len() {
            None
        } else {
            Some(index)
        }
    }

    pub fn add_value(&mut self, v: i32) {
        if let Some(index) = self.index_of(v) {
            self.buckets[index] += 1;
            self.ntups += 1;
        }
    }

    /// The estimated fraction of recorded values satisfying `value op v`.
    pub fn estimate_selectivity(&self, op: CmpOp, v: i32) -> f64 {
        if self.ntups == 0 {
            return 0.0;
        }
        match op {
            // LIKE over ints is equality
            CmpOp::Eq | CmpOp::Like => match self.index_of(v) {
                Some(index) => {
                    self.buckets[index] as f64 / self.width / self.ntups as f64
                }
                None => 0.0,
            },
            CmpOp::NotEq => 1.0 - self.estimate_selectivity(CmpOp::Eq, v),
            CmpOp::Gt => {
                if v >= self.max {
                    return 0.0;
                }
                if v < self.min {
                    return 1.0;
                }
                let index = match self.index_of(v) {
                    Some(index) => index,
                    None => return 0.0,
                };
                let mut sum: f64 = self.buckets[index + 1..]
                    .iter()
                    .map(|&count| count as f64)
                    .sum();
                // the part of v's own bucket strictly above v
                let right_edge = self.min as f64 + (index as f64 + 1.0) * self.width;
                sum += (right_edge - v as f64 - 1.0)
                    * (self.buckets[index] as f64 / self.width);
                sum / self.ntups as f64
            }
            CmpOp::GtEq => {
                self.estimate_selectivity(CmpOp::Eq, v)
                    + self.estimate_selectivity(CmpOp::Gt, v)
            }
            CmpOp::Lt => 1.0 - self.estimate_selectivity(CmpOp::GtEq, v),
            CmpOp::LtEq => 1.0 - self.estimate_selectivity(CmpOp::Gt, v),
        }
    }

    /// The mean per-bucket fill fraction.
    pub fn avg_selectivity(&self) -> f64 {
        if self.ntups == 0 {
            return 0.0;
        }
        let sum: f64 = self.buckets.iter().map(|&count| count as f64).sum();
        sum / self.ntups as f64 / self.buckets.len() as f64
    }
}

/// A histogram over one string column.
///
/// Strings map onto an integer range through a four-character prefix code,
/// and the estimates delegate to an [`IntHistogram`] over that range.
#[derive(Debug, Clone)]
pub struct StringHistogram {
    hist: IntHistogram,
}

impl StringHistogram {
    pub fn new(buckets: usize) -> Self {
        Self {
            hist: IntHistogram::new(buckets, Self::min_code(), Self::max_code()),
        }
    }

    fn min_code() -> i32 {
        Self::raw_code("")
    }

    fn max_code() -> i32 {
        Self::raw_code("zzzz")
    }

    /// Packs the first four bytes of `s` big-endian into an integer.
    fn raw_code(s: &str) -> i32 {
        let bytes = s.as_bytes();
        let mut v: i64 = 0;
        for i in (0..4).rev() {
            if bytes.len() > 3 - i {
                v += (bytes[3 - i] as i64) << (i * 8);
            }
        }
        v as i32
    }

    fn code(s: &str) -> i32 {
        let v = Self::raw_code(s);
        if s.is_empty() {
            v
        } else {
            v.clamp(Self::min_code(), Self::max_code())
        }
    }

    pub fn add_value(&mut self, s: &str) {
        self.hist.add_value(Self::code(s));
    }

    pub fn estimate_selectivity(&self, op: CmpOp, s: &str) -> f64 {
        self.hist.estimate_selectivity(op, Self::code(s))
    }

    pub fn avg_selectivity(&self) -> f64 {
        self.hist.avg_selectivity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_mass_concentrates_in_one_bucket() {
        let mut hist = IntHistogram::new(10, 1, 100);
        for _ in 0..100 {
            hist.add_value(5);
        }
        assert!(hist.estimate_selectivity(CmpOp::Eq, 5) > 0.05);
        assert_eq!(hist.estimate_selectivity(CmpOp::Eq, 95), 0.0);
    }

    #[test]
    fn uniform_gt_is_near_half_at_the_median() {
        let mut hist = IntHistogram::new(10, 1, 100);
        for v in 1..=100 {
            hist.add_value(v);
        }
        let sel = hist.estimate_selectivity(CmpOp::Gt, 50);
        assert!((0.45..=0.55).contains(&sel), "got {}", sel);
    }

    #[test]
    fn out_of_range_operands_saturate() {
        let mut hist = IntHistogram::new(5, 0, 9);
        for v in 0..10 {
            hist.add_value(v);
        }
        assert_eq!(hist.estimate_selectivity(CmpOp::Gt, 50), 0.0);
        assert_eq!(hist.estimate_selectivity(CmpOp::Gt, -5), 1.0);
        assert_eq!(hist.estimate_selectivity(CmpOp::Eq, 42), 0.0);
        assert_eq!(hist.estimate_selectivity(CmpOp::NotEq, 42), 1.0);
    }

    #[test]
    fn complements_sum_to_one() {
        let mut hist = IntHistogram::new(8, 1, 64);
        for v in 1..=64 {
            hist.add_value(v);
        }
        for v in [1, 17, 32, 63] {
            let gt = hist.estimate_selectivity(CmpOp::Gt, v);
            let le = hist.estimate_selectivity(CmpOp::LtEq, v);
            assert!((gt + le - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn narrow_range_clamps_width_to_one() {
        let mut hist = IntHistogram::new(100, 1, 10);
        for v in 1..=10 {
            hist.add_value(v);
        }
        let sel = hist.estimate_selectivity(CmpOp::Eq, 3);
        assert!((sel - 0.1).abs() < 1e-9);
    }

    #[test]
    fn empty_histogram_estimates_zero() {
        let hist = IntHistogram::new(10, 1, 100);
        assert_eq!(hist.estimate_selectivity(CmpOp::Eq, 5), 0.0);
        assert_eq!(hist.avg_selectivity(), 0.0);
    }

    #[test]
    fn string_codes_preserve_order() {
        assert!(StringHistogram::code("") < StringHistogram::code("a"));
        assert!(StringHistogram::code("apple") < StringHistogram::code("banana"));
        assert!(StringHistogram::code("zzzz") >= StringHistogram::code("yyyy"));
    }

    #[test]
    fn string_histogram_separates_prefixes() {
        let mut hist = StringHistogram::new(100);
        for _ in 0..50 {
            hist.add_value("aaaa");
        }
        for _ in 0..50 {
            hist.add_value("zzzz");
        }
        let low = hist.estimate_selectivity(CmpOp::Lt, "mmmm");
        assert!((low - 0.5).abs() < 0.05, "got {}", low);
    }
}
