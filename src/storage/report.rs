use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::HarnessError;

pub const CPU_INFO_REPORT: &str = "cpu_info.json";
pub const OP_REPORT: &str = "op_benchmarks.json";
pub const MEM_REPORT: &str = "mem_benchmarks.json";

const APP_DIR: &str = "vecbench";

/// Writes pretty-printed JSON reports into one directory.
///
/// Each report goes to a temp file next to its target and is renamed over it, so a failed
/// write leaves any previous report of the same name untouched.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<local data dir>/vecbench`, or `./vecbench` where the platform has none.
    pub fn default_location() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(APP_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write<T: Serialize + ?Sized>(
        &self,
        data: &T,
        file_name: &str,
    ) -> Result<PathBuf, HarnessError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, data)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| HarnessError::Persist {
            path: path.clone(),
            source: e.error,
        })?;

        info!(path = %path.display(), "report written");
        Ok(path)
    }

    pub fn read<T: DeserializeOwned>(path: &Path) -> Result<T, HarnessError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hardware::CpuReport;
    use crate::core::record::MemResult;
    use serde::Serializer;
    use tempfile::TempDir;

    fn record(size: usize) -> MemResult {
        MemResult {
            label: "MOVDQU LOAD (xmm)".to_string(),
            encoding: "xmm".to_string(),
            feature: "sse2".to_string(),
            op_type: "load".to_string(),
            n_vectors: 1,
            data_size: size,
            ilp: 4,
            size,
            alignment: 64,
            threads_h: 1,
            threads_l: 0,
            gbps: vec![41.5, 40.25, 42.0],
            elapsed: 0.0125,
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path());
        let records = vec![record(4096), record(8192)];

        let path = writer.write(&records, MEM_REPORT).unwrap();
        assert_eq!(path, dir.path().join(MEM_REPORT));

        let back: Vec<MemResult> = ReportWriter::read(&path).unwrap();
        assert_eq!(back, records);

        // one JSON array of named-field objects
        let raw: serde_json::Value = ReportWriter::read(&path).unwrap();
        assert_eq!(raw.as_array().map(Vec::len), Some(2));
        assert_eq!(raw[1]["size"], 8192);
        assert_eq!(raw[0]["threads_h"], 1);
    }

    #[test]
    fn test_creates_directory_and_replaces() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path().join("a").join("b"));
        let report = CpuReport {
            cpu_brand: "Test CPU".to_string(),
            cpu_p_cores: 8,
            cpu_e_cores: 4,
            features: vec!["sse2".to_string(), "avx".to_string()],
        };

        writer.write(&report, CPU_INFO_REPORT).unwrap();
        let updated = CpuReport {
            cpu_p_cores: 6,
            ..report
        };
        let path = writer.write(&updated, CPU_INFO_REPORT).unwrap();

        let back: CpuReport = ReportWriter::read(&path).unwrap();
        assert_eq!(back, updated);
        // no temp files left behind
        assert_eq!(std::fs::read_dir(writer.dir()).unwrap().count(), 1);
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn test_failed_write_keeps_previous_report() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path());
        let records = vec![record(4096)];
        let path = writer.write(&records, OP_REPORT).unwrap();

        let result = writer.write(&Unserializable, OP_REPORT);
        assert!(matches!(result, Err(HarnessError::Serialization(_))));

        let back: Vec<MemResult> = ReportWriter::read(&path).unwrap();
        assert_eq!(back, records);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_uncreatable_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let writer = ReportWriter::new(blocker.join("reports"));
        assert!(matches!(
            writer.write(&Vec::<MemResult>::new(), MEM_REPORT),
            Err(HarnessError::Io(_))
        ));
    }

    #[test]
    fn test_default_location() {
        let writer = ReportWriter::default_location();
        assert!(writer.dir().ends_with(APP_DIR));
    }
}
