//! Best-score persistence
//!
//! Features:
//! - Versioned JSON envelope
//! - Atomic writes (tmp file, then rename)
//! - Corrupt or missing saves read as a best score of 0

mod store;

pub use store::{BestScoreEnvelope, JsonFileStore, MemoryStore, SAVE_VERSION};

use crate::Result;

/// Persistence collaborator, called once per run start/new record/run end
pub trait ScoreStore {
    fn load_best_score(&self) -> Result<u64>;
    fn save_best_score(&mut self, score: u64) -> Result<()>;
}
