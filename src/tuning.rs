//! Data-driven game balance
//!
//! Every knob a designer might want to tweak between releases lives here.
//! Defaults are the shipping values; a JSON file may override any subset.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Look up a 1-based, level-indexed table entry with a documented fallback
/// for levels outside the table.
pub fn by_level(table: &[f32], level: u32, fallback: f32) -> f32 {
    level
        .checked_sub(1)
        .and_then(|i| table.get(i as usize))
        .copied()
        .unwrap_or(fallback)
}

/// Rigid-body world parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// Downward acceleration (units/s²)
    pub gravity: f32,
    /// Constraint solver iterations (more = less clipping through floors)
    pub solver_iterations: usize,
    /// Internal fixed timestep
    pub fixed_dt: f32,
    /// Max substeps per frame
    pub max_substeps: u32,
    pub default_friction: f32,
    pub default_restitution: f32,
    /// Track surface vs ball: some friction for rolling, some bounce for ramps
    pub track_friction: f32,
    pub track_restitution: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: 25.0,
            solver_iterations: 10,
            fixed_dt: crate::consts::SIM_DT,
            max_substeps: crate::consts::MAX_SUBSTEPS,
            default_friction: 0.3,
            default_restitution: 0.3,
            track_friction: 0.3,
            track_restitution: 0.25,
        }
    }
}

/// Track generator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackTuning {
    /// Floor height of the very first segment
    pub start_y: f32,
    /// Per-segment drop during the opening descent
    pub slope_step: f32,
    /// Number of segments in the opening descent
    pub descent_segments: u32,
    /// Per-segment drop after the descent, while above `late_slope_floor`
    pub late_slope_step: f32,
    pub late_slope_floor: f32,
    /// First N segments are always flat
    pub safe_start_segments: u32,
    /// Ramp chance during the descent
    pub descent_ramp_chance: f32,
    /// Ramp chance by level (last entry applies to all higher levels)
    pub ramp_chance_by_level: Vec<f32>,
    /// Hard ceiling on ramp chance
    pub max_ramp_chance: f32,
    /// Segments are retired this many segment lengths behind the ball
    pub trailing_segments: f32,
}

impl Default for TrackTuning {
    fn default() -> Self {
        Self {
            start_y: 10.0,
            slope_step: 0.08,
            descent_segments: 80,
            late_slope_step: 0.03,
            late_slope_floor: 0.3,
            safe_start_segments: 10,
            descent_ramp_chance: 0.12,
            ramp_chance_by_level: vec![0.20, 0.28, 0.35],
            max_ramp_chance: 0.35,
            trailing_segments: 3.0,
        }
    }
}

impl TrackTuning {
    /// Largest floor drop between two consecutive non-ramp segments
    pub fn max_step(&self) -> f32 {
        self.slope_step.max(self.late_slope_step)
    }
}

/// Obstacle spawner parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleTuning {
    /// Chance a segment gets an obstacle, by level
    pub frequency_by_level: Vec<f32>,
    /// Used for levels outside the table
    pub default_frequency: f32,
    /// Cumulative variant boundaries: wall < [0], arm < [1], block < [2], else low bar
    pub variant_thresholds: [f32; 3],
    /// Obstacles are retired this far behind the ball
    pub trailing_margin: f32,
}

impl Default for ObstacleTuning {
    fn default() -> Self {
        Self {
            frequency_by_level: vec![0.15, 0.25, 0.4, 0.6, 0.7, 0.8, 0.9],
            default_frequency: 0.3,
            variant_thresholds: [0.35, 0.55, 0.80],
            trailing_margin: 60.0,
        }
    }
}

/// Collectible spawner parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectibleTuning {
    /// Dot-cluster chance by level; rarer items scale from this
    pub density_by_level: Vec<f32>,
    pub default_density: f32,
    pub diamond_scale: f32,
    pub hoop_scale: f32,
    pub boost_scale: f32,
    /// Boosts only appear from this level on
    pub boost_min_level: u32,
    pub trailing_margin: f32,
    /// Shrink-out time after collection (seconds)
    pub fade_duration: f32,
}

impl Default for CollectibleTuning {
    fn default() -> Self {
        Self {
            density_by_level: vec![0.8, 0.65, 0.55, 0.7, 0.75, 0.85, 0.9],
            default_density: 0.7,
            diamond_scale: 0.3,
            hoop_scale: 0.15,
            boost_scale: 0.2,
            boost_min_level: 3,
            trailing_margin: 60.0,
            fade_duration: 0.2,
        }
    }
}

/// Ball behaviour parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub ghost_duration: f32,
    /// Vertical speed set on jump
    pub jump_up: f32,
    /// Extra forward speed on jump
    pub jump_forward_boost: f32,
    /// Grace window after last ground contact
    pub coyote_time: f32,
    /// Lateral force from discrete left/right keys
    pub key_force: f32,
    /// How far ahead of the fall point the ball reappears
    pub respawn_ahead: f32,
    pub respawn_forward_speed: f32,
    /// Drop below the local floor that counts as falling off
    pub fall_threshold: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            ghost_duration: 3.0,
            jump_up: 12.0,
            jump_forward_boost: 3.0,
            coyote_time: 0.2,
            key_force: 200.0,
            respawn_ahead: 20.0,
            respawn_forward_speed: 8.0,
            fall_threshold: 20.0,
        }
    }
}

/// Run-level parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunTuning {
    /// Forward speed at level 1 (units/s, along -Z)
    pub base_forward_speed: f32,
    pub lives: u8,
    /// Lookahead window in segments
    pub segments_ahead: u32,
    pub boost_duration: f32,
    pub boost_multiplier: f32,
    /// Speed fraction right after a hit
    pub hit_slow_min: f32,
    /// Recovery time after a hit, by level
    pub hit_slow_durations: Vec<f32>,
    pub default_hit_slow: f32,
    /// Initial fill: obstacles only on segments with index above this
    pub obstacle_start_index: u32,
    /// Initial fill: collectibles only on segments with index above this
    pub collectible_start_index: u32,
    /// Settle steps (at 60 Hz) before the run begins
    pub settle_steps: u32,
}

impl Default for RunTuning {
    fn default() -> Self {
        Self {
            base_forward_speed: 22.0,
            lives: 3,
            segments_ahead: 25,
            boost_duration: 0.5,
            boost_multiplier: 1.3,
            hit_slow_min: 0.4,
            hit_slow_durations: vec![2.0, 2.0, 2.0, 3.0, 3.5, 4.0, 4.5],
            default_hit_slow: 2.0,
            obstacle_start_index: 5,
            collectible_start_index: 2,
            settle_steps: 15,
        }
    }
}

/// Complete balance sheet
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub physics: PhysicsTuning,
    pub track: TrackTuning,
    pub obstacles: ObstacleTuning,
    pub collectibles: CollectibleTuning,
    pub player: PlayerTuning,
    pub run: RunTuning,
}

impl Tuning {
    /// Parse from JSON (missing fields take defaults)
    pub fn from_json(json: &str) -> Result<Self> {
        let tuning: Self = serde_json::from_str(json)?;
        Ok(tuning.sanitized())
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load from a JSON file, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(tuning) => {
                log::info!("Loaded tuning from {}", path.display());
                tuning
            }
            Err(e) => {
                log::warn!("Using default tuning ({}: {e})", path.display());
                Self::default()
            }
        }
    }

    /// Clamp values that would break the simulation back into range.
    pub fn sanitized(mut self) -> Self {
        fn unit(name: &str, v: &mut f32) {
            if !(0.0..=1.0).contains(v) || v.is_nan() {
                log::warn!("tuning: {name}={v} out of [0, 1], clamping");
                *v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
            }
        }

        for p in &mut self.obstacles.frequency_by_level {
            unit("obstacles.frequency_by_level", p);
        }
        unit("obstacles.default_frequency", &mut self.obstacles.default_frequency);
        for p in &mut self.collectibles.density_by_level {
            unit("collectibles.density_by_level", p);
        }
        unit("collectibles.default_density", &mut self.collectibles.default_density);
        for p in &mut self.track.ramp_chance_by_level {
            unit("track.ramp_chance_by_level", p);
        }
        unit("track.max_ramp_chance", &mut self.track.max_ramp_chance);
        unit("run.hit_slow_min", &mut self.run.hit_slow_min);

        if !(self.physics.fixed_dt > 0.0) {
            log::warn!("tuning: physics.fixed_dt must be positive, using default");
            self.physics.fixed_dt = crate::consts::SIM_DT;
        }
        self.physics.max_substeps = self.physics.max_substeps.max(1);
        self.physics.solver_iterations = self.physics.solver_iterations.max(1);
        self.run.segments_ahead = self.run.segments_ahead.max(1);
        self.run.lives = self.run.lives.max(1);
        self
    }
}
