//! Run fingerprinting: deterministic identification of strategy runs.
//!
//! - `ParamsHash`: exact identity of a strategy parameter set.
//! - `DatasetHash`: identity of the bar table a run was evaluated on.
//! - `RunId`: both together; two runs with equal ids are reproducible
//!   copies of each other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::strategy::StrategyParams;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamsHash(pub String);

impl ParamsHash {
    /// BLAKE3 over the canonical JSON of the parameters (sorted keys).
    pub fn of(params: &StrategyParams) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_value(params)?;
        Ok(Self(
            blake3::hash(canonical.to_string().as_bytes())
                .to_hex()
                .to_string(),
        ))
    }

    /// First 12 hex characters, enough to tell trials apart in logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ParamsHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of(bars: &[Bar]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for bar in bars {
            hasher.update(&bar.timestamp.timestamp_millis().to_le_bytes());
            hasher.update(&bar.bid_price.to_le_bytes());
            hasher.update(&bar.ask_price.to_le_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId {
    pub params: ParamsHash,
    pub dataset: DatasetHash,
}

impl RunId {
    pub fn new(params: &StrategyParams, bars: &[Bar]) -> Result<Self, serde_json::Error> {
        Ok(Self {
            params: ParamsHash::of(params)?,
            dataset: DatasetHash::of(bars),
        })
    }

    pub fn hash(&self) -> String {
        let canonical = serde_json::json!({
            "dataset": &self.dataset.0,
            "params": &self.params.0,
        });
        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.params.short(), &self.dataset.0[..self.dataset.0.len().min(12)])
    }
}
