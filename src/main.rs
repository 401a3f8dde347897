use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing::error;
use vecbench::core::config::{HarnessConfig, Suite};
use vecbench::core::hardware::CpuInfo;
use vecbench::core::harness::Harness;
use vecbench::core::registry::Registry;
use vecbench::core::runtime::Placement;
use vecbench::core::trial::ThreadedExecutor;
use vecbench::storage::report::{ReportWriter, CPU_INFO_REPORT, MEM_REPORT, OP_REPORT};
use vecbench::HarnessError;

const CYAN: &str = "\x1b[0;36m";
const RESET: &str = "\x1b[0m";

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SuiteArg {
    Ops,
    Memory,
    All,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Benchmark suite(s) to run
    #[arg(short, long, value_enum)]
    suite: Option<SuiteArg>,

    /// JSON config file; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only the 1H+0L and 0H+1L baselines, for every suite
    #[arg(long)]
    single_core: bool,

    /// Scale the memory suite across every core count too
    #[arg(long, conflicts_with = "single_core")]
    multi_core_memory: bool,

    /// Measured trials per configuration (both suites)
    #[arg(short, long)]
    trials: Option<usize>,

    /// Largest memory buffer size in bytes
    #[arg(long)]
    max_size: Option<usize>,

    /// Report directory (defaults to the per-user data directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Don't pin worker threads to cores
    #[arg(long)]
    no_pin: bool,

    /// Suppress dividers and per-configuration lines
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn harness_config(&self) -> Result<HarnessConfig, HarnessError> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(suite) = self.suite {
            config.suites = match suite {
                SuiteArg::Ops => vec![Suite::Ops],
                SuiteArg::Memory => vec![Suite::Memory],
                SuiteArg::All => vec![Suite::Ops, Suite::Memory],
            };
        }
        if self.single_core {
            config.ops_multi_core = false;
            config.memory_multi_core = false;
        }
        if self.multi_core_memory {
            config.memory_multi_core = true;
        }
        if let Some(trials) = self.trials {
            config.ops_trials = trials;
            config.memory_trials = trials;
        }
        if let Some(max) = self.max_size {
            config.sizes.max = Some(max);
        }
        if self.no_pin {
            config.pin_threads = false;
        }
        config.quiet |= self.quiet;

        config.validate()?;
        Ok(config)
    }
}

/// Write one report. Failures are logged and counted; later reports are still attempted.
fn save<T: Serialize + ?Sized>(writer: &ReportWriter, data: &T, file_name: &str, failed: &mut usize) {
    match writer.write(data, file_name) {
        Ok(path) => println!("\nreport written to {}", path.display()),
        Err(e) => {
            error!(error = %e, file = file_name, "failed to write report");
            *failed += 1;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = args.harness_config()?;
    let writer = match &args.output_dir {
        Some(dir) => ReportWriter::new(dir),
        None => ReportWriter::default_location(),
    };
    let mut failed = 0;

    println!("{CYAN}-- CPU info{RESET}");
    let cpu = CpuInfo::detect();
    println!("{}", cpu);
    save(&writer, &cpu.report(), CPU_INFO_REPORT, &mut failed);

    let registry = Registry::builtin();
    let placement = Placement::new(&cpu.classes, config.pin_threads);
    let executor = ThreadedExecutor::new(placement, config.op_iterations, config.memory_volume);
    let harness = Harness::new(&registry, &cpu.features, &executor, &config);

    if config.runs(Suite::Ops) {
        println!("\n{CYAN}-- Vector operations{RESET}");
        let outcome = harness.ops_suite()?;
        save(&writer, &outcome.results, OP_REPORT, &mut failed);
    }

    if config.runs(Suite::Memory) {
        let scope = if config.memory_multi_core {
            "all cores"
        } else {
            "one thread"
        };
        println!("\n{CYAN}-- Memory benchmarks ({scope}){RESET}");
        let outcome = harness.memory_suite()?;
        save(&writer, &outcome.results, MEM_REPORT, &mut failed);
    }

    if failed > 0 {
        error!(failed, dir = %writer.dir().display(), "some reports were not written");
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "vecbench",
            "--suite",
            "memory",
            "--single-core",
            "--trials",
            "5",
            "--max-size",
            "65536",
            "--no-pin",
        ]);
        let config = args.harness_config().unwrap();
        assert_eq!(config.suites, vec![Suite::Memory]);
        assert!(!config.ops_multi_core);
        assert_eq!(config.ops_trials, 5);
        assert_eq!(config.memory_trials, 5);
        assert_eq!(config.sizes.max, Some(65536));
        assert!(!config.pin_threads);
    }

    #[test]
    fn test_no_flags_is_default() {
        let args = Args::parse_from(["vecbench"]);
        assert_eq!(args.harness_config().unwrap(), HarnessConfig::default());
    }

    #[test]
    fn test_zero_trials_rejected() {
        let args = Args::parse_from(["vecbench", "--trials", "0"]);
        assert!(args.harness_config().is_err());
    }
}
