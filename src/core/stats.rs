/// One raw measurement: wall time of an invocation and the operations (or bytes) it did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialSample {
    pub elapsed: f64,
    pub total_ops: f64,
}

impl TrialSample {
    /// Billions of operations (or bytes) per second. Zero for a non-positive elapsed time.
    pub fn throughput(&self) -> f64 {
        if self.elapsed > 0.0 {
            self.total_ops / self.elapsed / 1e9
        } else {
            0.0
        }
    }
}

/// Median of `values`; the mean of the two middle values for even counts, 0.0 when empty.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Per-sample throughputs, in sample order.
pub fn throughputs(samples: &[TrialSample]) -> Vec<f64> {
    samples.iter().map(TrialSample::throughput).collect()
}

/// Median elapsed time over the samples.
pub fn median_elapsed(samples: &[TrialSample]) -> f64 {
    let elapsed: Vec<f64> = samples.iter().map(|s| s.elapsed).collect();
    median(&elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::Rng;

    #[test]
    fn test_median_basic() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[3.0]), 3.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_median_repeated_value() {
        for n in 1..=5 {
            let v = vec![0.125; n];
            assert_eq!(median(&v), 0.125);
        }
    }

    #[test]
    fn test_median_order_independent_and_bounded() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let n = rng.gen_range(1..40);
            let mut values: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e3..1e3)).collect();
            let m = median(&values);

            let reversed: Vec<f64> = values.iter().rev().copied().collect();
            assert_eq!(median(&reversed), m);
            values.shuffle(&mut rng);
            assert_eq!(median(&values), m);

            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(min <= m && m <= max);
        }
    }

    #[test]
    fn test_throughput() {
        let s = TrialSample {
            elapsed: 0.5,
            total_ops: 4e9,
        };
        assert_eq!(s.throughput(), 8.0);

        let zero = TrialSample {
            elapsed: 0.0,
            total_ops: 1.0,
        };
        assert_eq!(zero.throughput(), 0.0);
    }

    #[test]
    fn test_median_elapsed_is_not_elapsed_of_median_throughput() {
        // elapsed and throughput medians are taken independently
        let samples = [
            TrialSample { elapsed: 1.0, total_ops: 1e9 },
            TrialSample { elapsed: 2.0, total_ops: 8e9 },
            TrialSample { elapsed: 4.0, total_ops: 8e9 },
        ];
        assert_eq!(median_elapsed(&samples), 2.0);
        assert_eq!(throughputs(&samples), vec![1.0, 4.0, 2.0]);
        assert_eq!(median(&throughputs(&samples)), 2.0);
    }
}
