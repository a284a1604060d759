//! Score store implementations

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ScoreStore;
use crate::{Error, Result};

/// Current save format version
pub const SAVE_VERSION: u32 = 1;

/// On-disk envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestScoreEnvelope {
    pub version: u32,
    pub best_score: u64,
}

impl BestScoreEnvelope {
    pub fn new(best_score: u64) -> Self {
        Self {
            version: SAVE_VERSION,
            best_score,
        }
    }

    /// Parse and version-check an envelope
    pub fn from_json(json: &str) -> Result<Self> {
        let envelope: Self = serde_json::from_str(json)?;
        if envelope.version > SAVE_VERSION {
            return Err(Error::UnsupportedVersion {
                found: envelope.version,
                supported: SAVE_VERSION,
            });
        }
        Ok(envelope)
    }
}

/// In-memory store (tests, sessions without storage)
#[derive(Debug, Default)]
pub struct MemoryStore {
    best: u64,
    saves: u32,
}

impl MemoryStore {
    pub fn with_best(best: u64) -> Self {
        Self { best, saves: 0 }
    }

    /// Number of save calls so far
    pub fn saves(&self) -> u32 {
        self.saves
    }
}

impl ScoreStore for MemoryStore {
    fn load_best_score(&self) -> Result<u64> {
        Ok(self.best)
    }

    fn save_best_score(&mut self, score: u64) -> Result<()> {
        self.best = score;
        self.saves += 1;
        Ok(())
    }
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl ScoreStore for JsonFileStore {
    fn load_best_score(&self) -> Result<u64> {
        if !self.path.exists() {
            log::info!("No best score at {}, starting fresh", self.path.display());
            return Ok(0);
        }
        let json = std::fs::read_to_string(&self.path)?;
        match BestScoreEnvelope::from_json(&json) {
            Ok(envelope) => {
                log::info!("Loaded best score {}", envelope.best_score);
                Ok(envelope.best_score)
            }
            Err(Error::Json(e)) => {
                log::warn!("Corrupt best score file {} ({e}), ignoring", self.path.display());
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn save_best_score(&mut self, score: u64) -> Result<()> {
        let json = serde_json::to_string(&BestScoreEnvelope::new(score))?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        log::info!("Best score saved ({})", score);
        Ok(())
    }
}
