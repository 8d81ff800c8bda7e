/// Compensated (Kahan-Babuska / Neumaier) f64 sum
///
/// Every total in the crate goes through this accumulator, so the summary
/// figure and the sum of bucket totals agree for the same rows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
    count: usize,
}

impl KahanSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
        self.count += 1;
    }

    pub fn sum(&self) -> f64 {
        self.sum + self.compensation
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Arithmetic mean, `None` before the first value
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum() / self.count as f64)
    }
}

impl FromIterator<f64> for KahanSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = KahanSum::new();
        for v in iter {
            acc.add(v);
        }
        acc
    }
}
