//! Score-driven difficulty levels
//!
//! Level is a pure function of cumulative score. The controller remembers the
//! last level it announced so level-up feedback fires exactly once per level.

use serde::Serialize;

/// A difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Difficulty {
    /// Score at which this tier begins
    pub min_score: u64,
    pub level: u32,
    pub name: &'static str,
    /// Forward speed multiplier
    pub speed_multiplier: f32,
}

/// Tier table, strictly increasing in both threshold and multiplier
pub const LEVELS: [Difficulty; 5] = [
    Difficulty {
        min_score: 0,
        level: 1,
        name: "Easy",
        speed_multiplier: 1.0,
    },
    Difficulty {
        min_score: 150,
        level: 2,
        name: "Medium",
        speed_multiplier: 1.15,
    },
    Difficulty {
        min_score: 600,
        level: 3,
        name: "Hard",
        speed_multiplier: 1.3,
    },
    Difficulty {
        min_score: 1500,
        level: 4,
        name: "Very Hard",
        speed_multiplier: 1.5,
    },
    Difficulty {
        min_score: 3000,
        level: 5,
        name: "Extreme",
        speed_multiplier: 1.7,
    },
];

/// Highest tier whose threshold the score has reached
pub fn difficulty_for_score(score: u64) -> &'static Difficulty {
    LEVELS
        .iter()
        .rev()
        .find(|d| score >= d.min_score)
        .unwrap_or(&LEVELS[0])
}

/// Speed multiplier for a level number; unknown levels run at 1.0
pub fn speed_multiplier(level: u32) -> f32 {
    LEVELS
        .iter()
        .find(|d| d.level == level)
        .map(|d| d.speed_multiplier)
        .unwrap_or(1.0)
}

/// Tracks the last announced level
#[derive(Debug, Clone)]
pub struct DifficultyController {
    current_level: u32,
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::new()
    }
}

impl DifficultyController {
    pub fn new() -> Self {
        Self {
            current_level: LEVELS[0].level,
        }
    }

    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    /// Returns the new tier only on the call where the level strictly rises
    pub fn check_level_up(&mut self, score: u64) -> Option<&'static Difficulty> {
        let d = difficulty_for_score(score);
        if d.level > self.current_level {
            self.current_level = d.level;
            log::info!("Level up: {} ({})", d.level, d.name);
            Some(d)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.current_level = LEVELS[0].level;
    }
}
