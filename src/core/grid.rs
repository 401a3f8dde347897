use crate::core::hardware::FeatureSet;
use serde::{Deserialize, Serialize};

/// Number of high-priority and low-priority worker threads for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub high: usize,
    pub low: usize,
}

impl ThreadConfig {
    pub const fn new(high: usize, low: usize) -> Self {
        Self { high, low }
    }

    pub fn total(&self) -> usize {
        self.high + self.low
    }
}

impl std::fmt::Display for ThreadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}H+{}L", self.high, self.low)
    }
}

/// Buffer size and alignment handed to memory kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemParams {
    pub size: usize,
    pub alignment: usize,
}

/// Thread configurations to test.
///
/// Single-core mode gives one P-thread and one E-thread baseline. Multi-core mode scales
/// high-priority threads from 1 to P+E cores, then low-priority threads from 1 to E cores.
pub fn thread_grid(features: &FeatureSet, multi_core: bool) -> Vec<ThreadConfig> {
    if !multi_core {
        return vec![ThreadConfig::new(1, 0), ThreadConfig::new(0, 1)];
    }

    let high = (1..=features.total_cores()).map(|n| ThreadConfig::new(n, 0));
    let low = (1..=features.efficiency_cores()).map(|n| ThreadConfig::new(0, n));
    high.chain(low).collect()
}

/// Buffer sizes: `linear` evenly spaced steps per phase, the step growing by `linear * 2`
/// between phases. Dense at small sizes, sparse at large ones.
pub fn size_grid(
    initial: usize,
    linear: usize,
    multiplicative: usize,
    max: Option<usize>,
) -> Vec<usize> {
    let mut sizes = Vec::with_capacity(linear * multiplicative);
    let mut step = initial;
    for _ in 0..multiplicative {
        sizes.extend((1..=linear).map(|i| i * step));
        step = step * linear * 2;
    }

    match max {
        Some(max) => sizes.into_iter().filter(|&s| s <= max).collect(),
        None => sizes,
    }
}

/// Skip memory configurations whose combined footprint exceeds twice the largest size.
pub fn admits(threads: ThreadConfig, size: usize, max_size: usize) -> bool {
    threads.total() * size <= 2 * max_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_grid_phases() {
        let sizes = size_grid(4096, 4, 5, None);
        assert_eq!(sizes.len(), 20);
        assert_eq!(&sizes[0..4], &[4096, 8192, 12288, 16384]);
        assert_eq!(&sizes[4..8], &[32768, 65536, 98304, 131072]);

        // every phase starts at the previous step * linear * 2
        let mut step = 4096;
        for phase in sizes.chunks(4) {
            assert_eq!(phase[0], step);
            assert_eq!(phase[3], step * 4);
            step *= 8;
        }
        assert_eq!(*sizes.last().unwrap(), 64 * 1024 * 1024);
        assert!(sizes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_size_grid_max_filter() {
        let sizes = size_grid(4096, 4, 5, Some(131072));
        assert_eq!(
            sizes,
            vec![4096, 8192, 12288, 16384, 32768, 65536, 98304, 131072]
        );
        assert!(size_grid(4096, 4, 5, Some(1000)).is_empty());
    }

    #[test]
    fn test_size_grid_single_linear_step() {
        assert_eq!(size_grid(64, 1, 4, None), vec![64, 128, 256, 512]);
        assert!(size_grid(64, 0, 4, None).is_empty());
        assert!(size_grid(64, 4, 0, None).is_empty());
    }

    #[test]
    fn test_thread_grid_multi_core() {
        let features = FeatureSet::from_names(4, 2, []);
        let grid = thread_grid(&features, true);
        let expected: Vec<ThreadConfig> = vec![
            ThreadConfig::new(1, 0),
            ThreadConfig::new(2, 0),
            ThreadConfig::new(3, 0),
            ThreadConfig::new(4, 0),
            ThreadConfig::new(5, 0),
            ThreadConfig::new(6, 0),
            ThreadConfig::new(0, 1),
            ThreadConfig::new(0, 2),
        ];
        assert_eq!(grid, expected);
        assert_eq!(thread_grid(&features, true), grid);
    }

    #[test]
    fn test_thread_grid_single_core() {
        let features = FeatureSet::from_names(8, 4, []);
        assert_eq!(
            thread_grid(&features, false),
            vec![ThreadConfig::new(1, 0), ThreadConfig::new(0, 1)]
        );
    }

    #[test]
    fn test_thread_grid_zero_counts() {
        assert!(thread_grid(&FeatureSet::empty(), true).is_empty());

        let p_only = thread_grid(&FeatureSet::from_names(3, 0, []), true);
        assert_eq!(p_only.len(), 3);
        assert!(p_only.iter().all(|t| t.low == 0 && t.total() > 0));
    }

    #[test]
    fn test_admission_rule() {
        let max = 131072;
        assert!(!admits(ThreadConfig::new(2, 1), max, max));
        assert!(admits(ThreadConfig::new(2, 0), max, max));
        assert!(admits(ThreadConfig::new(1, 1), max, max));
        assert!(admits(ThreadConfig::new(6, 0), 4096, max));
    }

    #[test]
    fn test_thread_config_display() {
        assert_eq!(ThreadConfig::new(3, 1).to_string(), "3H+1L");
    }
}
