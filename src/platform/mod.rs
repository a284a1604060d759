//! Platform abstraction layer
//!
//! The simulation core never renders, draws HUD or reads devices. It talks to
//! its collaborators through these interfaces:
//! - `scene`: visual handles (add/place/remove, geometry disposal)
//! - `hud`: score/lives/level/ghost readouts
//! - `input`: normalized per-frame control state

pub mod hud;
pub mod input;
pub mod scene;

pub use hud::{Hud, LogHud, NullHud};
pub use input::FrameInput;
pub use scene::{
    Geometry, HeadlessScene, MaterialKey, Placement, Scene, SharedGeometry, VisualHandle, VisualRef,
};
