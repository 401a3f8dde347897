use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use vecbench::core::hardware::CpuReport;
use vecbench::core::record::{format_bytes, MemResult, OpResult};
use vecbench::storage::report::ReportWriter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Summarize a vecbench report", long_about = None)]
struct Args {
    /// Report file (cpu_info.json, op_benchmarks.json or mem_benchmarks.json)
    report: PathBuf,
}

enum Report {
    Cpu(CpuReport),
    Ops(Vec<OpResult>),
    Memory(Vec<MemResult>),
}

fn load(path: &Path) -> Result<Report, Box<dyn std::error::Error>> {
    let value: serde_json::Value = ReportWriter::read(path)?;
    if value.is_object() {
        return Ok(Report::Cpu(serde_json::from_value(value)?));
    }
    // Memory records are the only ones with a buffer size
    let is_memory = value
        .as_array()
        .and_then(|a| a.first())
        .is_some_and(|r| r.get("size").is_some());
    if is_memory {
        Ok(Report::Memory(serde_json::from_value(value)?))
    } else {
        Ok(Report::Ops(serde_json::from_value(value)?))
    }
}

/// Keep, per key, the entry with the highest score. Keys come out in first-seen order.
fn best_by<'a, T>(
    items: &'a [T],
    key: impl Fn(&T) -> String,
    score: impl Fn(&T) -> f64,
) -> Vec<(String, &'a T)> {
    let mut order = Vec::new();
    let mut best: BTreeMap<String, &T> = BTreeMap::new();
    for item in items {
        let k = key(item);
        match best.get(&k) {
            Some(current) if score(current) >= score(item) => {}
            Some(_) => {
                best.insert(k, item);
            }
            None => {
                order.push(k.clone());
                best.insert(k, item);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|k| best.get(&k).map(|&v| (k, v)))
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    println!("Loading report from {:?}", args.report);

    match load(&args.report)? {
        Report::Cpu(cpu) => {
            println!("CPU          {}", cpu.cpu_brand);
            println!("P-cores      {}", cpu.cpu_p_cores);
            println!("E-cores      {}", cpu.cpu_e_cores);
            println!("Features     {}", cpu.features.join(", "));
        }
        Report::Ops(results) => {
            println!("Records: {}", results.len());
            let best = best_by(
                &results,
                |r| format!("{} ILP={}", r.label, r.ilp),
                OpResult::median_gops,
            );
            for (key, r) in best {
                println!(
                    "{:<50} | threads {:<6} | {:>10.2} GOP/s",
                    key,
                    r.threads().to_string(),
                    r.median_gops()
                );
            }
        }
        Report::Memory(results) => {
            println!("Records: {}", results.len());
            let best = best_by(
                &results,
                |r| format!("{} ILP={}", r.label, r.ilp),
                MemResult::median_gbps,
            );
            for (key, r) in best {
                println!(
                    "{:<40} | {:>8} @{:<4} | threads {:<6} | {:>10.2} GB/s",
                    key,
                    format_bytes(r.size),
                    r.alignment,
                    r.threads().to_string(),
                    r.median_gbps()
                );
            }
        }
    }
    Ok(())
}
