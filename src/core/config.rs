use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::grid::size_grid;
use crate::error::HarnessError;
use crate::simd::buffer::{MIN_ALIGNMENT, SIZE_GRANULE};

/// Benchmark suites the host can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    Ops,
    Memory,
}

/// Parameters of the memory size grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeGridConfig {
    pub initial: usize,
    pub linear: usize,
    pub multiplicative: usize,
    pub max: Option<usize>,
}

impl Default for SizeGridConfig {
    fn default() -> Self {
        // 4 KB to 64 MB
        Self {
            initial: 4096,
            linear: 4,
            multiplicative: 5,
            max: None,
        }
    }
}

impl SizeGridConfig {
    pub fn sizes(&self) -> Vec<usize> {
        size_grid(self.initial, self.linear, self.multiplicative, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub suites: Vec<Suite>,
    /// Scale arithmetic benchmarks across every core count
    pub ops_multi_core: bool,
    /// Scale memory benchmarks across every core count
    pub memory_multi_core: bool,
    pub ops_trials: usize,
    pub memory_trials: usize,
    /// Discarded invocations before measuring
    pub warmup: usize,
    pub sizes: SizeGridConfig,
    pub alignments: Vec<usize>,
    /// Loop iterations per arithmetic kernel invocation (split across ILP chains)
    pub op_iterations: usize,
    /// Bytes each memory worker moves per invocation
    pub memory_volume: usize,
    pub pin_threads: bool,
    /// Suppress per-configuration progress lines
    pub quiet: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            suites: vec![Suite::Ops, Suite::Memory],
            ops_multi_core: true,
            memory_multi_core: false,
            ops_trials: 20,
            memory_trials: 10,
            warmup: 2,
            sizes: SizeGridConfig::default(),
            alignments: vec![16, 32, 64, 128, 256],
            op_iterations: 8_000_000,
            memory_volume: 512 << 20,
            pin_threads: true,
            quiet: false,
        }
    }
}

impl HarnessConfig {
    /// Load a JSON config; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn runs(&self, suite: Suite) -> bool {
        self.suites.contains(&suite)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.ops_trials == 0 || self.memory_trials == 0 {
            return Err(HarnessError::InvalidParams(
                "trial counts must be positive".to_string(),
            ));
        }
        let sizes = &self.sizes;
        if sizes.initial == 0 || sizes.linear == 0 || sizes.multiplicative == 0 {
            return Err(HarnessError::InvalidParams(
                "size grid parameters must be positive".to_string(),
            ));
        }
        if self.alignments.is_empty() {
            return Err(HarnessError::InvalidParams(
                "at least one alignment is required".to_string(),
            ));
        }
        // every grid size is a multiple of the initial one
        if sizes.initial % SIZE_GRANULE != 0 {
            return Err(HarnessError::InvalidParams(format!(
                "initial size {} is not a multiple of {}",
                sizes.initial, SIZE_GRANULE
            )));
        }
        if let Some(&bad) = self
            .alignments
            .iter()
            .find(|a| !a.is_power_of_two() || **a < MIN_ALIGNMENT)
        {
            return Err(HarnessError::InvalidParams(format!(
                "alignment {} is not a power of two >= {}",
                bad, MIN_ALIGNMENT
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert!(config.runs(Suite::Ops));
        assert!(config.runs(Suite::Memory));
        assert_eq!(config.ops_trials, 20);
        assert_eq!(config.memory_trials, 10);
        assert_eq!(config.warmup, 2);
        assert_eq!(config.sizes.sizes().len(), 20);
        assert_eq!(config.sizes.sizes().last(), Some(&(64 << 20)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "suites": ["memory"], "memory_trials": 3, "sizes": {{ "max": 65536 }} }}"#
        )
        .unwrap();

        let config = HarnessConfig::load(file.path()).unwrap();
        assert_eq!(config.suites, vec![Suite::Memory]);
        assert!(!config.runs(Suite::Ops));
        assert_eq!(config.memory_trials, 3);
        assert_eq!(config.ops_trials, 20);
        assert_eq!(config.sizes.initial, 4096);
        assert_eq!(config.sizes.sizes().last(), Some(&65536));
    }

    #[test]
    fn test_rejects_invalid() {
        let config = HarnessConfig {
            memory_trials: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            alignments: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            sizes: SizeGridConfig {
                initial: 100,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HarnessError::InvalidParams(_))
        ));

        for alignment in [3, 8, 48] {
            let config = HarnessConfig {
                alignments: vec![64, alignment],
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(HarnessError::InvalidParams(_))),
                "alignment {} accepted",
                alignment
            );
        }

        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "sizes": {{ "initial": 4000 }} }}"#).unwrap();
        assert!(HarnessConfig::load(file.path()).is_err());

        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "suites": ["gpu"] }}"#).unwrap();
        assert!(matches!(
            HarnessConfig::load(file.path()),
            Err(HarnessError::Serialization(_))
        ));
    }
}
