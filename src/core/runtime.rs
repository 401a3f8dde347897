use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

pub struct RuntimeConfig;

impl RuntimeConfig {
    /// Pin current thread to the logical CPU `cpu`.
    pub fn pin_thread(cpu: usize) -> bool {
        let core_ids = core_affinity::get_core_ids();
        if let Some(ids) = core_ids {
            if let Some(id) = ids.into_iter().find(|c| c.id == cpu) {
                return core_affinity::set_for_current(id);
            }
        }
        false
    }

    /// Hint the scheduler that the current thread is a high- or low-priority worker.
    ///
    /// On macOS this selects the QoS class (user-initiated vs. utility), which is what
    /// steers threads to P- or E-cores. On Linux low-priority threads get a positive nice
    /// value; high-priority threads are left alone.
    pub fn set_thread_priority(low: bool) -> bool {
        #[cfg(target_os = "macos")]
        {
            let class = if low {
                libc::qos_class_t::QOS_CLASS_UTILITY
            } else {
                libc::qos_class_t::QOS_CLASS_USER_INITIATED
            };
            unsafe { libc::pthread_set_qos_class_self_np(class, 0) == 0 }
        }

        #[cfg(target_os = "linux")]
        {
            if !low {
                return true;
            }
            unsafe {
                let tid = libc::syscall(libc::SYS_gettid) as libc::id_t;
                libc::setpriority(libc::PRIO_PROCESS, tid, 10) == 0
            }
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            let _ = low;
            false
        }
    }

    /// Logical CPUs available to this process.
    pub fn logical_cpus() -> Vec<usize> {
        match core_affinity::get_core_ids() {
            Some(ids) if !ids.is_empty() => ids.into_iter().map(|c| c.id).collect(),
            _ => {
                let n = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                (0..n).collect()
            }
        }
    }
}

/// Worker role inside one kernel invocation: the index counts within its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    High(usize),
    Low(usize),
}

/// Where benchmark worker threads are placed.
///
/// High-priority workers fill performance cores first and spill onto efficiency cores
/// (the thread grid asks for up to P+E high-priority threads). Low-priority workers stay
/// on efficiency cores.
#[derive(Debug, Clone, Default)]
pub struct Placement {
    high_order: Vec<usize>,
    low_order: Vec<usize>,
    pin: bool,
}

impl Placement {
    pub fn new(classes: &CoreClasses, pin: bool) -> Self {
        let topology = Topology::detect();
        let spread = |cpus: &[usize]| match &topology {
            Some(t) => t.spread_order(cpus),
            None => cpus.to_vec(),
        };

        let mut high_order = spread(&classes.performance);
        high_order.extend(spread(&classes.efficiency));
        let low_order = spread(&classes.efficiency);

        Self {
            high_order,
            low_order,
            pin,
        }
    }

    /// No pinning, priority hints only.
    pub fn unpinned() -> Self {
        Self::default()
    }

    pub fn cpu_for(&self, role: WorkerRole) -> Option<usize> {
        let (order, i) = match role {
            WorkerRole::High(i) => (&self.high_order, i),
            WorkerRole::Low(i) => (&self.low_order, i),
        };
        if order.is_empty() {
            None
        } else {
            Some(order[i % order.len()])
        }
    }

    /// Apply priority and affinity to the calling thread.
    pub fn apply(&self, role: WorkerRole) {
        let low = matches!(role, WorkerRole::Low(_));
        if !RuntimeConfig::set_thread_priority(low) {
            debug!(?role, "thread priority hint not applied");
        }
        if self.pin {
            if let Some(cpu) = self.cpu_for(role) {
                if !RuntimeConfig::pin_thread(cpu) {
                    debug!(?role, cpu, "failed to pin worker thread");
                }
            }
        }
    }
}

/// Logical CPU ids split by core class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreClasses {
    pub performance: Vec<usize>,
    pub efficiency: Vec<usize>,
}

impl CoreClasses {
    /// Read the core classes from a Linux sysfs tree rooted at `root` (normally `/sys`).
    ///
    /// Intel hybrid parts expose `devices/cpu_core/cpus` and `devices/cpu_atom/cpus`.
    /// ARM big.LITTLE parts expose a per-CPU `cpu_capacity`; the highest capacity is the
    /// performance class. Returns `None` when neither source exists.
    pub fn from_sysfs(root: &Path) -> Option<Self> {
        let read = |p: &Path| std::fs::read_to_string(root.join(p)).ok();

        if let Some(core) = read(Path::new("devices/cpu_core/cpus")) {
            let performance = parse_cpu_list(&core);
            let efficiency = read(Path::new("devices/cpu_atom/cpus"))
                .map(|s| parse_cpu_list(&s))
                .unwrap_or_default();
            if !performance.is_empty() {
                return Some(Self {
                    performance,
                    efficiency,
                });
            }
        }

        let cpu_dir = root.join("devices/system/cpu");
        let entries = std::fs::read_dir(&cpu_dir).ok()?;
        let mut capacities = BTreeMap::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_prefix("cpu"))
                .and_then(|n| n.parse::<usize>().ok())
            else {
                continue;
            };
            if let Ok(raw) = std::fs::read_to_string(entry.path().join("cpu_capacity")) {
                if let Ok(cap) = raw.trim().parse::<u64>() {
                    capacities.insert(id, cap);
                }
            }
        }

        let max = *capacities.values().max()?;
        let (performance, efficiency): (Vec<_>, Vec<_>) =
            capacities.iter().partition(|entry| *entry.1 == max);
        Some(Self {
            performance: performance.into_iter().map(|(&id, _)| id).collect(),
            efficiency: efficiency.into_iter().map(|(&id, _)| id).collect(),
        })
    }
}

/// Parse a kernel cpulist such as `0-3,8,10-11`.
pub fn parse_cpu_list(list: &str) -> Vec<usize> {
    let mut cpus = BTreeSet::new();
    for part in list.trim().split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                if let (Ok(lo), Ok(hi)) = (lo.parse::<usize>(), hi.parse::<usize>()) {
                    cpus.extend(lo..=hi);
                }
            }
            None => {
                if let Ok(cpu) = part.parse() {
                    cpus.insert(cpu);
                }
            }
        }
    }
    cpus.into_iter().collect()
}

#[derive(Debug, Clone)]
pub struct CoreInfo {
    pub logical_id: usize,
    pub physical_id: usize, // Socket
    pub core_id: usize,     // Physical Core on Socket
}

pub struct Topology {
    pub cores: Vec<CoreInfo>,
}

impl Topology {
    /// Detect CPU Topology from /proc/cpuinfo (Linux)
    pub fn detect() -> Option<Self> {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Option<Self> {
        let mut cores = Vec::new();

        let mut current_proc = None;
        let mut current_socket = None;
        let mut current_core = None;

        let mut flush = |p: &mut Option<usize>, s: &mut Option<usize>, c: &mut Option<usize>| {
            if let (Some(logical_id), Some(physical_id), Some(core_id)) = (*p, *s, *c) {
                cores.push(CoreInfo {
                    logical_id,
                    physical_id,
                    core_id,
                });
            }
            *p = None;
            *s = None;
            *c = None;
        };

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                flush(&mut current_proc, &mut current_socket, &mut current_core);
                continue;
            }

            if line.starts_with("processor") {
                current_proc = parse_value(line).and_then(|v| v.parse().ok());
            } else if line.starts_with("physical id") {
                current_socket = parse_value(line).and_then(|v| v.parse().ok());
            } else if line.starts_with("core id") {
                current_core = parse_value(line).and_then(|v| v.parse().ok());
            }
        }
        // Last block without trailing newline
        flush(&mut current_proc, &mut current_socket, &mut current_core);

        if cores.is_empty() {
            None
        } else {
            Some(Self { cores })
        }
    }

    /// Number of distinct physical cores behind the given logical CPUs.
    /// Logical CPUs missing from the topology count as one core each.
    pub fn physical_count(&self, logical: &[usize]) -> usize {
        let mut seen = BTreeSet::new();
        let mut unknown = 0;
        for &cpu in logical {
            match self.cores.iter().find(|c| c.logical_id == cpu) {
                Some(c) => {
                    seen.insert((c.physical_id, c.core_id));
                }
                None => unknown += 1,
            }
        }
        seen.len() + unknown
    }

    /// Order `logical` so that every physical core gets one thread before any SMT sibling does.
    pub fn spread_order(&self, logical: &[usize]) -> Vec<usize> {
        // Group by (Socket, CoreID) -> List of Logical IDs
        let mut core_map: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        let mut unknown = Vec::new();

        for &cpu in logical {
            match self.cores.iter().find(|c| c.logical_id == cpu) {
                Some(core) => core_map
                    .entry((core.physical_id, core.core_id))
                    .or_default()
                    .push(cpu),
                None => unknown.push(cpu),
            }
        }

        let mut ordered = Vec::with_capacity(logical.len());
        let mut level = 0;
        loop {
            let before = ordered.len();
            for siblings in core_map.values() {
                if let Some(&cpu) = siblings.get(level) {
                    ordered.push(cpu);
                }
            }
            if ordered.len() == before {
                break;
            }
            level += 1;
        }
        ordered.extend(unknown);
        ordered
    }
}

fn parse_value(line: &str) -> Option<&str> {
    line.split(':').nth(1).map(|s| s.trim())
}
