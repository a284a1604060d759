//! Run state, transient speed modifiers, gameplay events and snapshots

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::collectibles::CollectibleKind;
use super::player::BallMode;

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GamePhase {
    /// Before the first run
    #[default]
    Menu,
    Playing,
    GameOver,
}

/// Boost and post-hit slowdown, both elapsed-time countdowns
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpeedModifiers {
    pub boost_remaining: f32,
    pub hit_slow_remaining: f32,
    pub hit_slow_duration: f32,
}

impl SpeedModifiers {
    pub fn start_boost(&mut self, duration: f32) {
        self.boost_remaining = duration;
    }

    pub fn start_hit_slow(&mut self, duration: f32) {
        self.hit_slow_duration = duration.max(f32::EPSILON);
        self.hit_slow_remaining = self.hit_slow_duration;
    }

    pub fn is_boosting(&self) -> bool {
        self.boost_remaining > 0.0
    }

    pub fn is_slowed(&self) -> bool {
        self.hit_slow_remaining > 0.0
    }

    pub fn advance(&mut self, dt: f32) {
        if self.boost_remaining > 0.0 {
            self.boost_remaining = (self.boost_remaining - dt).max(0.0);
        }
        if self.hit_slow_remaining > 0.0 {
            self.hit_slow_remaining = (self.hit_slow_remaining - dt).max(0.0);
        }
    }

    /// Combined forward speed factor.
    ///
    /// The slowdown recovers linearly from `slow_min` back to 1 over its duration.
    pub fn multiplier(&self, boost: f32, slow_min: f32) -> f32 {
        let boost = if self.is_boosting() { boost } else { 1.0 };
        let slow = if self.is_slowed() {
            let progress = 1.0 - self.hit_slow_remaining / self.hit_slow_duration;
            slow_min + (1.0 - slow_min) * progress
        } else {
            1.0
        };
        boost * slow
    }
}

/// Score, lives and progress for the current run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunState {
    pub score: u64,
    pub best_score: u64,
    /// Best score when the run began
    pub best_at_start: u64,
    pub lives: u8,
    pub level: u32,
    /// Sim time since the run began
    pub elapsed: f32,
    pub modifiers: SpeedModifiers,
    /// A new best has already been persisted this run
    pub record_saved: bool,
}

impl RunState {
    pub fn new(best_score: u64, lives: u8) -> Self {
        Self {
            score: 0,
            best_score,
            best_at_start: best_score,
            lives,
            level: 1,
            elapsed: 0.0,
            modifiers: SpeedModifiers::default(),
            record_saved: false,
        }
    }
}

/// Why a life was lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DamageCause {
    Obstacle,
    Fall,
}

/// Something that happened during a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    Collected { kind: CollectibleKind, points: u64 },
    BoostStarted,
    Damaged { lives_left: u8, cause: DamageCause },
    GhostStarted,
    GhostEnded,
    Jumped,
    Respawned { z: f32 },
    LevelUp { level: u32, name: &'static str },
    NewBest { score: u64 },
    GameOver { score: u64, best: u64 },
}

/// Obstacle as seen by collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObstacleView {
    pub id: u32,
    pub kind: &'static str,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Collectible as seen by collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectibleView {
    pub id: u32,
    pub kind: CollectibleKind,
    pub position: Vec3,
    pub collected: bool,
}

/// Per-tick view of the simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub phase: GamePhase,
    pub ball_position: Vec3,
    pub ball_velocity: Vec3,
    pub mode: BallMode,
    pub score: u64,
    pub best_score: u64,
    pub level: u32,
    pub lives: u8,
    pub elapsed: f32,
    pub forward_speed: f32,
    pub obstacles: Vec<ObstacleView>,
    pub collectibles: Vec<CollectibleView>,
}
