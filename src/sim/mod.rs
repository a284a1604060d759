//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must stay deterministic:
//! - Fixed physics timestep only
//! - Seeded RNG only (one `Pcg32` per run)
//! - Stable iteration order (live lists kept in generation order)
//! - No rendering or platform dependencies beyond the `platform` traits

pub mod camera;
pub mod collectibles;
pub mod collision;
pub mod difficulty;
pub mod obstacles;
pub mod physics;
pub mod player;
pub mod state;
pub mod tick;
pub mod track;

pub use camera::CameraRig;
pub use collectibles::{CollectResult, Collectible, CollectibleKind, CollectibleSpawner};
pub use collision::{
    ContactSummary, RailClamp, clamp_to_rails, classify_contacts, is_fallen, passes_through_ring,
    settle_vertical, sphere_overlap,
};
pub use difficulty::{Difficulty, DifficultyController, LEVELS, difficulty_for_score, speed_multiplier};
pub use obstacles::{Obstacle, ObstacleKind, ObstacleSpawner};
pub use physics::{BodyHandle, ContactEvent, ContactKind, PhysicsWorld, SurfaceMaterial};
pub use player::{Ball, BallMode};
pub use state::{
    CollectibleView, DamageCause, GameEvent, GamePhase, ObstacleView, RunState, Snapshot, SpeedModifiers,
};
pub use tick::Game;
pub use track::{RailSpan, SegmentInfo, SegmentKind, TrackGenerator};
