use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid memory parameters: {0}")]
    InvalidParams(String),
    #[error("Thread configuration requests no threads")]
    NoThreads,
    #[error("{0} benchmark worker(s) panicked")]
    WorkerPanicked(usize),
    #[error("Benchmark '{label}' failed: {source}")]
    Benchmark {
        label: String,
        #[source]
        source: Box<HarnessError>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to persist report {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    /// Attach the failing benchmark's label.
    pub fn in_benchmark(self, label: &str) -> Self {
        HarnessError::Benchmark {
            label: label.to_string(),
            source: Box::new(self),
        }
    }
}
