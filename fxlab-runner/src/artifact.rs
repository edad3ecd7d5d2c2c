//! JSON result artifacts.
//!
//! Every report is wrapped in an [`Artifact`] envelope carrying the schema
//! version, the instrument and the dataset fingerprint. Unknown schema
//! versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use fxlab_core::fingerprint::DatasetHash;

pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact<T> {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Command that produced the report ("backtest", "optimize", ...).
    pub kind: String,
    pub instrument: String,
    pub dataset: Option<DatasetHash>,
    /// Produced on synthetic quotes; never comparable with real runs.
    pub synthetic: bool,
    pub report: T,
}

impl<T> Artifact<T> {
    pub fn new(kind: &str, instrument: &str, report: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            kind: kind.to_string(),
            instrument: instrument.to_string(),
            dataset: None,
            synthetic: false,
            report,
        }
    }

    pub fn with_dataset(mut self, dataset: DatasetHash, synthetic: bool) -> Self {
        self.dataset = Some(dataset);
        self.synthetic = synthetic;
        self
    }
}

pub fn export_json<T: Serialize>(artifact: &Artifact<T>) -> Result<String> {
    serde_json::to_string_pretty(artifact).context("failed to serialize artifact to JSON")
}

pub fn import_json<T: DeserializeOwned>(json: &str) -> Result<Artifact<T>> {
    let artifact: Artifact<T> =
        serde_json::from_str(json).context("failed to deserialize artifact from JSON")?;
    if artifact.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            artifact.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(artifact)
}

/// Write `<dir>/<name>.json`, creating `dir` if needed.
pub fn write_artifact<T: Serialize>(
    dir: &Path,
    name: &str,
    artifact: &Artifact<T>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let path = dir.join(format!("{name}.json"));
    std::fs::write(&path, export_json(artifact)?)
        .with_context(|| format!("failed to write artifact to {}", path.display()))?;
    Ok(path)
}

pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<Artifact<T>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read artifact {}", path.display()))?;
    import_json(&json)
}
