//! Procedural track streaming
//!
//! Segments are emitted one per call at strictly decreasing Z. The generator
//! tracks a floor height that descends during the opening stretch, forces the
//! first segments flat, and follows every ramp with an empty gap the ball has
//! to fly over.

use std::collections::VecDeque;

use glam::{Quat, Vec3};
use rand::Rng;
use serde::Serialize;

use super::physics::{BodyHandle, PhysicsWorld, groups};
use crate::consts::*;
use crate::platform::{Geometry, MaterialKey, Placement, Scene, SharedGeometry, VisualRef};
use crate::ramp_rise;
use crate::tuning::TrackTuning;

/// Neon tints cycled per segment
const NEON_COLORS: [u32; 6] = [0x00ff88, 0x00ffcc, 0x00ddff, 0x44ffaa, 0x00ffff, 0x88ff44];
const RAMP_NEON: u32 = 0x44ff88;

/// Segment shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentKind {
    Flat,
    RampUp,
    /// No geometry; the ball is airborne across it
    Gap,
}

/// Read-only view of a segment for the other spawners
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentInfo {
    pub id: u32,
    pub kind: SegmentKind,
    pub z_pos: f32,
    pub width: f32,
    /// Floor height at the near (entry) edge
    pub start_y: f32,
    /// Floor height at the far (exit) edge
    pub end_y: f32,
}

impl SegmentInfo {
    /// Floor height at the segment centre
    pub fn floor_y(&self) -> f32 {
        (self.start_y + self.end_y) * 0.5
    }

    pub fn is_traversable(&self) -> bool {
        self.kind != SegmentKind::Gap
    }
}

/// A live segment and the resources it owns
#[derive(Debug)]
pub struct Segment {
    pub info: SegmentInfo,
    bodies: Vec<BodyHandle>,
    visuals: Vec<VisualRef>,
}

impl Segment {
    pub fn bodies(&self) -> &[BodyHandle] {
        &self.bodies
    }

    pub fn visuals(&self) -> &[VisualRef] {
        &self.visuals
    }

    fn release(self, world: &mut PhysicsWorld, scene: &mut dyn Scene) {
        for body in self.bodies {
            world.remove_body(body);
        }
        for visual in self.visuals {
            visual.release(scene);
        }
    }
}

/// Extent of the two continuous rail visuals over the live track
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RailSpan {
    pub center_z: f32,
    pub length: f32,
    pub y: f32,
    pub half_width: f32,
}

/// Streaming track generator
pub struct TrackGenerator {
    tuning: TrackTuning,
    segments: VecDeque<Segment>,
    next_z: f32,
    current_y: f32,
    total_generated: u32,
    pending_gap: bool,
}

impl TrackGenerator {
    pub fn new(tuning: TrackTuning) -> Self {
        Self {
            current_y: tuning.start_y,
            tuning,
            segments: VecDeque::new(),
            next_z: 0.0,
            total_generated: 0,
            pending_gap: false,
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &SegmentInfo> {
        self.segments.iter().map(|s| &s.info)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn current_y(&self) -> f32 {
        self.current_y
    }

    pub fn total_generated(&self) -> u32 {
        self.total_generated
    }

    pub fn body_count(&self) -> usize {
        self.segments.iter().map(|s| s.bodies.len()).sum()
    }

    pub fn visual_count(&self) -> usize {
        self.segments.iter().map(|s| s.visuals.len()).sum()
    }

    /// Z of the most recently generated segment (0 when empty)
    pub fn last_segment_z(&self) -> f32 {
        self.segments.back().map(|s| s.info.z_pos).unwrap_or(0.0)
    }

    pub fn first(&self) -> Option<&SegmentInfo> {
        self.segments.front().map(|s| &s.info)
    }

    /// Segment whose slot contains `z`
    pub fn segment_at(&self, z: f32) -> Option<&SegmentInfo> {
        let half = SEGMENT_LENGTH * 0.5;
        self.segments
            .iter()
            .map(|s| &s.info)
            .find(|s| (z - s.z_pos).abs() <= half)
    }

    /// Height of a ramp surface under `z`, from its actual tilted extent.
    ///
    /// A ramp box is `SEGMENT_GEOM_LENGTH` long, so it reaches into the
    /// slots of its neighbours.
    fn ramp_surface(&self, z: f32) -> Option<f32> {
        let reach = HALF_SEGMENT * RAMP_ANGLE.cos();
        self.segments
            .iter()
            .map(|s| &s.info)
            .find(|s| s.kind == SegmentKind::RampUp && (z - s.z_pos).abs() <= reach)
            .map(|s| {
                let y = s.start_y + ramp_rise() - (z - s.z_pos) * RAMP_ANGLE.tan();
                y.clamp(s.start_y, s.end_y)
            })
    }

    /// Floor height under `z`, or the generator's current Y if nothing
    /// covers it. Ramps report their sloped surface wherever it reaches;
    /// gaps report the floor the ball will land on.
    pub fn floor_at(&self, z: f32) -> f32 {
        let ramp = self.ramp_surface(z);
        match self.segment_at(z) {
            Some(seg) if seg.kind == SegmentKind::Flat => ramp.map_or(seg.end_y, |r| r.max(seg.end_y)),
            Some(seg) => ramp.unwrap_or(seg.end_y),
            None => ramp.unwrap_or(self.current_y),
        }
    }

    /// True when `z` is over flat track with no ramp surface reaching it
    pub fn is_level_at(&self, z: f32) -> bool {
        self.ramp_surface(z).is_none()
            && self
                .segment_at(z)
                .is_some_and(|s| s.kind == SegmentKind::Flat)
    }

    /// Where to put the ball back down: `z` itself when its slot has track,
    /// otherwise the centre of the next segment ahead that does. Returns the
    /// landing Z and its floor height.
    pub fn landing_at(&self, z: f32) -> (f32, f32) {
        let half = SEGMENT_LENGTH * 0.5;
        let landing = self
            .segments
            .iter()
            .map(|s| &s.info)
            .filter(|s| s.z_pos - half <= z)
            .find(|s| s.is_traversable())
            .map_or(z, |s| if (z - s.z_pos).abs() <= half { z } else { s.z_pos });
        (landing, self.floor_at(landing))
    }

    fn ramp_chance(&self, level: u32) -> f32 {
        let table = &self.tuning.ramp_chance_by_level;
        let chance = if self.total_generated < self.tuning.descent_segments {
            self.tuning.descent_ramp_chance
        } else if table.is_empty() {
            0.0
        } else {
            let idx = (level.max(1) as usize - 1).min(table.len() - 1);
            table[idx]
        };
        chance.min(self.tuning.max_ramp_chance)
    }

    fn choose_kind<R: Rng + ?Sized>(&self, level: u32, rng: &mut R) -> SegmentKind {
        if self.total_generated < self.tuning.safe_start_segments {
            return SegmentKind::Flat;
        }
        if rng.random::<f32>() < self.ramp_chance(level) {
            SegmentKind::RampUp
        } else {
            SegmentKind::Flat
        }
    }

    /// Emit the next segment ahead of the frontier
    pub fn generate_segment<R: Rng + ?Sized>(
        &mut self,
        level: u32,
        rng: &mut R,
        world: &mut PhysicsWorld,
        scene: &mut dyn Scene,
    ) -> SegmentInfo {
        let id = self.total_generated;
        let z = self.next_z;

        let segment = if self.pending_gap {
            self.pending_gap = false;
            Segment {
                info: SegmentInfo {
                    id,
                    kind: SegmentKind::Gap,
                    z_pos: z,
                    width: TRACK_WIDTH,
                    start_y: self.current_y,
                    end_y: self.current_y,
                },
                bodies: Vec::new(),
                visuals: Vec::new(),
            }
        } else {
            if self.total_generated < self.tuning.descent_segments {
                self.current_y -= self.tuning.slope_step;
            } else if self.current_y > self.tuning.late_slope_floor {
                self.current_y -= self.tuning.late_slope_step;
            }
            self.current_y = self.current_y.max(0.0);

            match self.choose_kind(level, rng) {
                SegmentKind::RampUp => {
                    // The floor stays at slope level after the gap
                    self.pending_gap = true;
                    build_ramp(id, z, self.current_y, world, scene)
                }
                _ => build_flat(id, z, self.current_y, world, scene),
            }
        };

        log::debug!(
            "segment {} {:?} z={:.1} y={:.2}..{:.2}",
            id,
            segment.info.kind,
            z,
            segment.info.start_y,
            segment.info.end_y
        );

        let info = segment.info;
        self.segments.push_back(segment);
        self.next_z -= SEGMENT_LENGTH;
        self.total_generated += 1;
        info
    }

    /// Retire segments the ball has left behind. Returns how many were removed.
    pub fn remove_old(&mut self, player_z: f32, world: &mut PhysicsWorld, scene: &mut dyn Scene) -> usize {
        let threshold = self.trailing_threshold(player_z);
        let mut removed = 0;
        while self
            .segments
            .front()
            .is_some_and(|s| s.info.z_pos > threshold)
        {
            if let Some(seg) = self.segments.pop_front() {
                seg.release(world, scene);
                removed += 1;
            }
        }
        if removed > 0 {
            log::debug!("retired {} segment(s) behind z={:.1}", removed, player_z);
        }
        removed
    }

    pub fn trailing_threshold(&self, player_z: f32) -> f32 {
        player_z + SEGMENT_LENGTH * self.tuning.trailing_segments
    }

    /// Release everything and rewind the cursors
    pub fn reset(&mut self, world: &mut PhysicsWorld, scene: &mut dyn Scene) {
        for seg in self.segments.drain(..) {
            seg.release(world, scene);
        }
        self.next_z = 0.0;
        self.current_y = self.tuning.start_y;
        self.total_generated = 0;
        self.pending_gap = false;
    }

    /// Continuous rail extent over all live segments
    pub fn rail_span(&self) -> Option<RailSpan> {
        let first = self.segments.front()?;
        let (min_z, max_z) = self
            .segments
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.info.z_pos), hi.max(s.info.z_pos))
            });
        let reference = self
            .segments
            .iter()
            .map(|s| &s.info)
            .find(|s| s.kind == SegmentKind::Flat)
            .unwrap_or(&first.info);

        let near = max_z + HALF_SEGMENT;
        let far = min_z - HALF_SEGMENT;
        Some(RailSpan {
            center_z: (near + far) * 0.5,
            length: near - far,
            y: reference.end_y + RAIL_HEIGHT * 0.5,
            half_width: reference.width * 0.5,
        })
    }
}

/// Spawn a segment visual from a group-local offset
fn spawn_local(
    scene: &mut dyn Scene,
    origin: Vec3,
    rotation: Quat,
    local: Vec3,
    geometry: Geometry,
    material: MaterialKey,
) -> VisualRef {
    let placement = Placement::at(origin + rotation * local).with_rotation(rotation);
    VisualRef::spawn(scene, geometry, material, placement)
}

/// Surface, rails and edge strips for one segment
fn segment_visuals(
    scene: &mut dyn Scene,
    origin: Vec3,
    rotation: Quat,
    surface: MaterialKey,
    neon: u32,
) -> Vec<VisualRef> {
    let half_w = TRACK_WIDTH * 0.5;
    let mut visuals = vec![spawn_local(
        scene,
        origin,
        rotation,
        Vec3::new(0.0, -TRACK_THICKNESS * 0.5, 0.0),
        Geometry::Cuboid {
            half_extents: Vec3::new(half_w, TRACK_THICKNESS * 0.5, HALF_SEGMENT),
        },
        surface,
    )];
    for side in [-1.0, 1.0] {
        visuals.push(spawn_local(
            scene,
            origin,
            rotation,
            Vec3::new(side * half_w, RAIL_HEIGHT * 0.5, 0.0),
            Geometry::Shared(SharedGeometry::RailTube),
            MaterialKey::Neon(neon),
        ));
        visuals.push(spawn_local(
            scene,
            origin,
            rotation,
            Vec3::new(side * half_w, 0.01, 0.0),
            Geometry::Shared(SharedGeometry::EdgeStrip),
            MaterialKey::Neon(neon),
        ));
    }
    visuals
}

/// Surface box plus two rail boxes, all rotated about X around their own centres
fn segment_bodies(world: &mut PhysicsWorld, origin: Vec3, tilt: f32) -> Vec<BodyHandle> {
    let rotation = Quat::from_rotation_x(tilt);
    let half_w = TRACK_WIDTH * 0.5;
    let material = world.track_material();
    let rail_material = world.default_material();

    let surface_center = origin + rotation * Vec3::new(0.0, -TRACK_THICKNESS * 0.5, 0.0);
    let mut bodies = vec![world.add_static_box(
        surface_center,
        Vec3::new(half_w, TRACK_THICKNESS * 0.5, HALF_SEGMENT),
        tilt,
        groups::TRACK,
        material,
    )];
    for side in [-1.0, 1.0] {
        let center = origin + rotation * Vec3::new(side * half_w, RAIL_HEIGHT * 0.5, 0.0);
        bodies.push(world.add_static_box(
            center,
            Vec3::new(RAIL_HALF_X, RAIL_HEIGHT, HALF_SEGMENT),
            tilt,
            groups::RAIL,
            rail_material,
        ));
    }
    bodies
}

fn build_flat(id: u32, z: f32, y: f32, world: &mut PhysicsWorld, scene: &mut dyn Scene) -> Segment {
    let origin = Vec3::new(0.0, y, z);
    let neon = NEON_COLORS[id as usize % NEON_COLORS.len()];
    Segment {
        info: SegmentInfo {
            id,
            kind: SegmentKind::Flat,
            z_pos: z,
            width: TRACK_WIDTH,
            start_y: y,
            end_y: y,
        },
        bodies: segment_bodies(world, origin, 0.0),
        visuals: segment_visuals(scene, origin, Quat::IDENTITY, MaterialKey::Track, neon),
    }
}

/// Ramp whose near edge sits at `y` and far edge is `2 * ramp_rise()` higher.
/// Positive tilt about X lifts the -Z (far) edge.
fn build_ramp(id: u32, z: f32, y: f32, world: &mut PhysicsWorld, scene: &mut dyn Scene) -> Segment {
    let rise = ramp_rise();
    let origin = Vec3::new(0.0, y + rise, z);
    let rotation = Quat::from_rotation_x(RAMP_ANGLE);

    let mut visuals = segment_visuals(scene, origin, rotation, MaterialKey::Ramp, RAMP_NEON);
    for i in 0..3 {
        visuals.push(spawn_local(
            scene,
            origin,
            rotation,
            Vec3::new(0.0, 0.03, -3.0 + i as f32 * 3.0),
            Geometry::Shared(SharedGeometry::RampArrow),
            MaterialKey::Neon(RAMP_NEON),
        ));
    }

    Segment {
        info: SegmentInfo {
            id,
            kind: SegmentKind::RampUp,
            z_pos: z,
            width: TRACK_WIDTH,
            start_y: y,
            end_y: y + 2.0 * rise,
        },
        bodies: segment_bodies(world, origin, RAMP_ANGLE),
        visuals,
    }
}
