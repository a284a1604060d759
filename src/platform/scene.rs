//! Scene collaborator interface
//!
//! Visuals are opaque handles owned by whatever renders them. Geometry is
//! either drawn from a shared pool (never disposed by the core) or created
//! for one instance and disposed together with it.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Opaque visual handle issued by the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualHandle(pub u32);

/// Pooled geometry shared between many visuals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SharedGeometry {
    Ball,
    RailTube,
    EdgeStrip,
    RampArrow,
    BlockCube,
    Pillar,
    Dot,
    Diamond,
    Hoop,
    Boost,
}

/// Geometry backing a visual
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// From the shared pool; outlives any single visual
    Shared(SharedGeometry),
    /// Per-instance box
    Cuboid { half_extents: Vec3 },
}

impl Geometry {
    pub fn is_shared(&self) -> bool {
        matches!(self, Geometry::Shared(_))
    }
}

/// Material lookup key (the scene owns the actual materials)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKey {
    Track,
    Ramp,
    /// Emissive neon tint (0xRRGGBB)
    Neon(u32),
    Wall,
    Arm,
    Block,
    Bar,
    Dot,
    Diamond,
    Hoop,
    Boost,
    Ball,
    BallGhost,
}

/// Scene-relative placement of a visual
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub visible: bool,
    /// Emissive strength multiplier, 1.0 is the material's own glow
    pub glow: f32,
}

impl Placement {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            visible: true,
            glow: 1.0,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_glow(mut self, glow: f32) -> Self {
        self.glow = glow;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Rendering collaborator
pub trait Scene {
    fn add_visual(
        &mut self,
        geometry: Geometry,
        material: MaterialKey,
        placement: Placement,
    ) -> VisualHandle;
    fn place_visual(&mut self, handle: VisualHandle, placement: Placement);
    fn set_material(&mut self, handle: VisualHandle, material: MaterialKey);
    fn remove_visual(&mut self, handle: VisualHandle);
    /// Release per-instance geometry. Never called for shared geometry.
    fn dispose_geometry(&mut self, handle: VisualHandle);
}

/// A visual owned by a sim entity, remembering how to release it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualRef {
    pub handle: VisualHandle,
    pub geometry: Geometry,
}

impl VisualRef {
    pub fn spawn(
        scene: &mut dyn Scene,
        geometry: Geometry,
        material: MaterialKey,
        placement: Placement,
    ) -> Self {
        let handle = scene.add_visual(geometry, material, placement);
        Self { handle, geometry }
    }

    /// Remove from the scene, disposing the geometry only if this visual owns it
    pub fn release(self, scene: &mut dyn Scene) {
        if !self.geometry.is_shared() {
            scene.dispose_geometry(self.handle);
        }
        scene.remove_visual(self.handle);
    }
}

/// A live visual as tracked by [`HeadlessScene`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneEntry {
    pub geometry: Geometry,
    pub material: MaterialKey,
    pub placement: Placement,
}

/// Bookkeeping-only scene for headless runs and tests
#[derive(Debug, Default)]
pub struct HeadlessScene {
    next_id: u32,
    live: HashMap<VisualHandle, SceneEntry>,
    disposed: usize,
    /// Attempts to dispose pooled geometry (always a bug)
    shared_disposals: usize,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn get(&self, handle: VisualHandle) -> Option<&SceneEntry> {
        self.live.get(&handle)
    }

    pub fn disposed_count(&self) -> usize {
        self.disposed
    }

    pub fn shared_disposals(&self) -> usize {
        self.shared_disposals
    }
}

impl Scene for HeadlessScene {
    fn add_visual(
        &mut self,
        geometry: Geometry,
        material: MaterialKey,
        placement: Placement,
    ) -> VisualHandle {
        self.next_id += 1;
        let handle = VisualHandle(self.next_id);
        self.live.insert(
            handle,
            SceneEntry {
                geometry,
                material,
                placement,
            },
        );
        handle
    }

    fn place_visual(&mut self, handle: VisualHandle, placement: Placement) {
        if let Some(entry) = self.live.get_mut(&handle) {
            entry.placement = placement;
        }
    }

    fn set_material(&mut self, handle: VisualHandle, material: MaterialKey) {
        if let Some(entry) = self.live.get_mut(&handle) {
            entry.material = material;
        }
    }

    fn remove_visual(&mut self, handle: VisualHandle) {
        if self.live.remove(&handle).is_none() {
            log::warn!("remove_visual: unknown handle {:?}", handle);
        }
    }

    fn dispose_geometry(&mut self, handle: VisualHandle) {
        match self.live.get(&handle) {
            Some(entry) if entry.geometry.is_shared() => {
                log::warn!("dispose_geometry on shared geometry {:?}", entry.geometry);
                self.shared_disposals += 1;
            }
            Some(_) => self.disposed += 1,
            None => log::warn!("dispose_geometry: unknown handle {:?}", handle),
        }
    }
}
