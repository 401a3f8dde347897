//! Hardware detection.
//! Queries CPU features and the performance/efficiency core split at runtime.
use crate::core::runtime::{CoreClasses, RuntimeConfig, Topology};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::System;
use tracing::{debug, warn};

bitflags! {
    /// Closed allow-list of features the harness knows how to gate on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features: u32 {
        // x86 / x86_64
        const SSE = 1 << 0;
        const SSE2 = 1 << 1;
        const SSE4_1 = 1 << 2;
        const AVX = 1 << 3;
        const AVX2 = 1 << 4;
        const FMA = 1 << 5;
        const F16C = 1 << 6;
        const AVX512F = 1 << 7;
        // aarch64
        const NEON = 1 << 16;
        const FP16 = 1 << 17;
        const DOTPROD = 1 << 18;
        const I8MM = 1 << 19;
        const BF16 = 1 << 20;
        const SVE = 1 << 21;
        const SVE2 = 1 << 22;
    }
}

/// Feature names as reported in benchmark definitions and reports.
pub const KNOWN_FEATURES: &[(&str, Features)] = &[
    ("sse", Features::SSE),
    ("sse2", Features::SSE2),
    ("sse4.1", Features::SSE4_1),
    ("avx", Features::AVX),
    ("avx2", Features::AVX2),
    ("fma", Features::FMA),
    ("f16c", Features::F16C),
    ("avx512f", Features::AVX512F),
    ("neon", Features::NEON),
    ("fp16", Features::FP16),
    ("dotprod", Features::DOTPROD),
    ("i8mm", Features::I8MM),
    ("bf16", Features::BF16),
    ("sve", Features::SVE),
    ("sve2", Features::SVE2),
];

pub fn feature_flag(name: &str) -> Option<Features> {
    KNOWN_FEATURES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| *f)
}

/// Probed features plus the two core counts. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    features: Features,
    performance_cores: usize,
    efficiency_cores: usize,
}

impl FeatureSet {
    pub fn new(performance_cores: usize, efficiency_cores: usize, features: Features) -> Self {
        Self {
            features,
            performance_cores,
            efficiency_cores,
        }
    }

    /// Build from feature names; names outside the allow-list are ignored.
    pub fn from_names<'a>(
        performance_cores: usize,
        efficiency_cores: usize,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let features = names
            .into_iter()
            .filter_map(feature_flag)
            .fold(Features::empty(), |acc, f| acc | f);
        Self::new(performance_cores, efficiency_cores, features)
    }

    /// What a failed probe degrades to: no cores, no features.
    pub fn empty() -> Self {
        Self::new(0, 0, Features::empty())
    }

    pub fn supports(&self, name: &str) -> bool {
        feature_flag(name).is_some_and(|f| self.features.contains(f))
    }

    pub fn names(&self) -> Vec<&'static str> {
        KNOWN_FEATURES
            .iter()
            .filter(|(_, f)| self.features.contains(*f))
            .map(|(n, _)| *n)
            .collect()
    }

    pub fn performance_cores(&self) -> usize {
        self.performance_cores
    }

    pub fn efficiency_cores(&self) -> usize {
        self.efficiency_cores
    }

    pub fn total_cores(&self) -> usize {
        self.performance_cores + self.efficiency_cores
    }
}

/// Everything the probe learns about the host.
#[derive(Debug, Clone)]
pub struct CpuInfo {
    pub brand: String,
    pub features: FeatureSet,
    /// Logical CPUs per class, used for thread placement. Empty where the OS does not say.
    pub classes: CoreClasses,
}

/// Serialized form of `CpuInfo` (cpu_info.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuReport {
    pub cpu_brand: String,
    pub cpu_p_cores: usize,
    pub cpu_e_cores: usize,
    pub features: Vec<String>,
}

impl CpuInfo {
    /// Probe the host. Never fails: anything that cannot be queried reads as zero/absent.
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        let brand = sys.global_cpu_info().brand().trim().to_string();

        let features = detect_features();
        let (p_cores, e_cores, classes) = detect_cores(&sys);
        debug!(p_cores, e_cores, ?features, "probed hardware");

        Self {
            brand,
            features: probed_set(p_cores, e_cores, features),
            classes,
        }
    }

    pub fn report(&self) -> CpuReport {
        CpuReport {
            cpu_brand: self.brand.clone(),
            cpu_p_cores: self.features.performance_cores(),
            cpu_e_cores: self.features.efficiency_cores(),
            features: self.features.names().into_iter().map(String::from).collect(),
        }
    }
}

impl std::fmt::Display for CpuInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "CPU          {}", self.brand)?;
        writeln!(f, "P-cores      {}", self.features.performance_cores())?;
        writeln!(f, "E-cores      {}", self.features.efficiency_cores())?;
        write!(f, "Features     {}", self.features.names().join(", "))
    }
}

/// Without any cores nothing can run, so the probe reports no features either.
fn probed_set(p_cores: usize, e_cores: usize, features: Features) -> FeatureSet {
    if p_cores + e_cores == 0 {
        warn!("could not determine core counts, every benchmark will be skipped");
        return FeatureSet::empty();
    }
    FeatureSet::new(p_cores, e_cores, features)
}

macro_rules! detect {
    ($macro:ident, $set:ident, $($name:tt => $flag:ident),+ $(,)?) => {
        $(
            if $macro!($name) {
                $set |= Features::$flag;
            }
        )+
    };
}

fn detect_features() -> Features {
    #[allow(unused_mut)]
    let mut set = Features::empty();

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        detect!(is_x86_feature_detected, set,
            "sse" => SSE,
            "sse2" => SSE2,
            "sse4.1" => SSE4_1,
            "avx" => AVX,
            "avx2" => AVX2,
            "fma" => FMA,
            "f16c" => F16C,
            "avx512f" => AVX512F,
        );
    }

    #[cfg(target_arch = "aarch64")]
    {
        use std::arch::is_aarch64_feature_detected;
        detect!(is_aarch64_feature_detected, set,
            "neon" => NEON,
            "fp16" => FP16,
            "dotprod" => DOTPROD,
            "i8mm" => I8MM,
            "bf16" => BF16,
            "sve" => SVE,
            "sve2" => SVE2,
        );
    }

    set
}

/// (performance count, efficiency count, logical CPUs per class)
fn detect_cores(sys: &System) -> (usize, usize, CoreClasses) {
    #[cfg(target_os = "macos")]
    {
        let p = sysctl_get_int("hw.perflevel0.physicalcpu");
        let e = sysctl_get_int("hw.perflevel1.physicalcpu");
        if p > 0 {
            return (p, e, CoreClasses::default());
        }
    }

    let classes = CoreClasses::from_sysfs(Path::new("/sys")).unwrap_or_else(|| CoreClasses {
        performance: RuntimeConfig::logical_cpus(),
        efficiency: Vec::new(),
    });

    match Topology::detect() {
        Some(topo) => {
            let p = topo.physical_count(&classes.performance);
            let e = topo.physical_count(&classes.efficiency);
            (p, e, classes)
        }
        None if classes.efficiency.is_empty() => {
            // no class split and no SMT information: trust the OS core count
            let p = sys
                .physical_core_count()
                .unwrap_or(classes.performance.len());
            (p, 0, classes)
        }
        None => (classes.performance.len(), classes.efficiency.len(), classes),
    }
}

#[cfg(target_os = "macos")]
fn sysctl_get_int(name: &str) -> usize {
    let Ok(cname) = std::ffi::CString::new(name) else {
        return 0;
    };
    let mut ret: i64 = 0;
    let mut size = std::mem::size_of::<i64>();
    let rc = unsafe {
        libc::sysctlbyname(
            cname.as_ptr(),
            &mut ret as *mut i64 as *mut libc::c_void,
            &mut size,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc == -1 || ret < 0 {
        0
    } else {
        ret as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_set_from_names() {
        let set = FeatureSet::from_names(4, 2, ["avx2", "fma", "not-a-feature"]);
        assert!(set.supports("avx2"));
        assert!(set.supports("fma"));
        assert!(!set.supports("avx512f"));
        assert!(!set.supports("not-a-feature"));
        assert_eq!(set.names(), vec!["avx2", "fma"]);
        assert_eq!(set.total_cores(), 6);
    }

    #[test]
    fn test_empty_feature_set() {
        let set = FeatureSet::empty();
        assert_eq!(set.total_cores(), 0);
        assert!(set.names().is_empty());
        for (name, _) in KNOWN_FEATURES {
            assert!(!set.supports(name));
        }
    }

    #[test]
    fn test_no_cores_means_no_features() {
        let set = probed_set(0, 0, Features::AVX | Features::SSE2);
        assert_eq!(set, FeatureSet::empty());
        assert!(!set.supports("avx"));

        let set = probed_set(2, 0, Features::AVX);
        assert!(set.supports("avx"));
        assert_eq!(set.total_cores(), 2);
    }

    #[test]
    fn test_known_feature_names_unique() {
        for (i, (a, fa)) in KNOWN_FEATURES.iter().enumerate() {
            for (b, fb) in &KNOWN_FEATURES[i + 1..] {
                assert_ne!(a, b);
                assert_ne!(fa, fb);
            }
        }
    }

    #[test]
    fn test_detect_does_not_fail() {
        let info = CpuInfo::detect();
        let report = info.report();
        assert_eq!(report.cpu_p_cores, info.features.performance_cores());
        for name in &report.features {
            assert!(feature_flag(name).is_some());
        }
        println!("{}", info);
    }
}
