//! Marble Runner - endless marble-runner arcade core
//!
//! Core modules:
//! - `sim`: Streaming world generation, physics integration, gameplay state
//! - `platform`: Scene/HUD/input collaborator interfaces (no rendering here)
//! - `audio`: Gameplay cues and tick-driven tone sequencing
//! - `persistence`: Best-score storage with a versioned JSON envelope
//! - `tuning`: Data-driven game balance

pub mod audio;
pub mod error;
pub mod persistence;
pub mod platform;
pub mod sim;
pub mod tuning;

pub use error::{Error, Result};
pub use tuning::Tuning;

/// Fixed geometry and timing constants
pub mod consts {
    /// Fixed physics timestep (120 Hz keeps the fast ball from tunneling)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum physics substeps per rendered frame
    pub const MAX_SUBSTEPS: u32 = 5;
    /// Longest frame the simulation will accept (seconds)
    pub const MAX_FRAME_DT: f32 = 0.05;
    /// Fallback dt when a caller hands us a zero/negative frame time
    pub const FALLBACK_DT: f32 = 1.0 / 60.0;

    /// Longitudinal spacing between generated segments
    pub const SEGMENT_LENGTH: f32 = 24.0;
    /// Extra geometry on each segment so neighbours overlap (no seams)
    pub const SEGMENT_OVERLAP: f32 = 12.0;
    /// Full length of a segment's geometry
    pub const SEGMENT_GEOM_LENGTH: f32 = SEGMENT_LENGTH + SEGMENT_OVERLAP;
    /// Half of the segment geometry length
    pub const HALF_SEGMENT: f32 = SEGMENT_GEOM_LENGTH / 2.0;
    /// Standard track width
    pub const TRACK_WIDTH: f32 = 9.0;
    pub const TRACK_HALF_WIDTH: f32 = TRACK_WIDTH / 2.0;
    pub const TRACK_THICKNESS: f32 = 3.0;

    /// Rails
    pub const RAIL_HEIGHT: f32 = 0.8;
    pub const RAIL_RADIUS: f32 = 0.25;
    /// Half-extent of the rail collision box in X
    pub const RAIL_HALF_X: f32 = RAIL_RADIUS * 2.0;

    /// Ramp tilt (radians, far edge up)
    pub const RAMP_ANGLE: f32 = 0.25;

    /// Ball
    pub const BALL_RADIUS: f32 = 0.65;
    pub const BALL_MASS: f32 = 5.0;
    pub const BALL_LINEAR_DAMPING: f32 = 0.2;
    pub const BALL_ANGULAR_DAMPING: f32 = 0.3;

    /// Lateral bound for the ball centre: inside both rails
    pub const TRACK_MAX_X: f32 = TRACK_HALF_WIDTH - RAIL_HALF_X - BALL_RADIUS;

    /// Lateral range items are placed in (reachable by the ball)
    pub const SAFE_X: f32 = 3.0;
}

/// Height gained from the near edge of a ramp to its centre
#[inline]
pub fn ramp_rise() -> f32 {
    consts::HALF_SEGMENT * consts::RAMP_ANGLE.sin()
}

/// Frame-rate independent smoothing factor for exponential follow
#[inline]
pub fn smooth_factor(rate: f32, dt: f32) -> f32 {
    1.0 - (-rate * dt).exp()
}

/// Clamp a lateral coordinate into the reachable item lane range
#[inline]
pub fn clamp_lane(x: f32) -> f32 {
    x.clamp(-consts::SAFE_X, consts::SAFE_X)
}
