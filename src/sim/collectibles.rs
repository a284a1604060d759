//! Collectible spawning, animation and pickup resolution
//!
//! Items are placed per segment. When the segment has an obstacle, every
//! item goes on the single lane that obstacle reports as passable.
//! Collected items shrink out over a short fade and stay in the live list
//! until the trailing cleanup removes them.

use glam::{Quat, Vec3};
use rand::Rng;
use serde::Serialize;

use super::collision::{passes_through_ring, sphere_overlap};
use super::obstacles::Obstacle;
use crate::clamp_lane;
use crate::platform::{Geometry, MaterialKey, Placement, Scene, SharedGeometry, VisualRef};
use crate::tuning::{CollectibleTuning, by_level};

const DOT_SPACING: f32 = 2.5;
const HOOP_INNER_RADIUS: f32 = 1.5;

/// Pickup variants
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum CollectibleKind {
    Dot,
    Diamond,
    /// Ring-gate: the ball must pass through `inner_radius`
    Hoop { inner_radius: f32 },
    Boost,
}

impl CollectibleKind {
    pub fn points(&self) -> u64 {
        match self {
            CollectibleKind::Dot => 10,
            CollectibleKind::Diamond => 50,
            CollectibleKind::Hoop { .. } => 100,
            CollectibleKind::Boost => 25,
        }
    }

    /// Height of the item centre above the floor
    fn height(&self) -> f32 {
        match self {
            CollectibleKind::Dot => 0.5,
            CollectibleKind::Diamond => 0.8,
            CollectibleKind::Hoop { .. } => 2.0,
            CollectibleKind::Boost => 0.6,
        }
    }

    /// Extra reach beyond the ball radius for sphere pickups
    fn capture_margin(&self) -> f32 {
        match self {
            CollectibleKind::Dot => 0.4,
            CollectibleKind::Diamond => 0.5,
            CollectibleKind::Hoop { .. } => 0.3,
            CollectibleKind::Boost => 0.45,
        }
    }

    fn visual(&self) -> (SharedGeometry, MaterialKey) {
        match self {
            CollectibleKind::Dot => (SharedGeometry::Dot, MaterialKey::Dot),
            CollectibleKind::Diamond => (SharedGeometry::Diamond, MaterialKey::Diamond),
            CollectibleKind::Hoop { .. } => (SharedGeometry::Hoop, MaterialKey::Hoop),
            CollectibleKind::Boost => (SharedGeometry::Boost, MaterialKey::Boost),
        }
    }
}

/// A live collectible
#[derive(Debug)]
pub struct Collectible {
    pub id: u32,
    pub kind: CollectibleKind,
    pub x: f32,
    pub z_pos: f32,
    /// Floor height the item hovers over
    pub base_y: f32,
    pub collected: bool,
    /// Sim time of collection
    pub collected_at: Option<f32>,
    pub visible: bool,
    placement: Placement,
    visual: VisualRef,
}

impl Collectible {
    pub fn points(&self) -> u64 {
        self.kind.points()
    }

    /// Animated centre at `time`
    pub fn position(&self, time: f32) -> Vec3 {
        let bob = match self.kind {
            CollectibleKind::Dot => (time * 3.0 + self.z_pos).sin() * 0.1,
            CollectibleKind::Boost => (time * 2.5 + self.z_pos).sin() * 0.15,
            _ => 0.0,
        };
        Vec3::new(self.x, self.base_y + self.kind.height() + bob, self.z_pos)
    }

    fn rotation(&self, time: f32) -> Quat {
        match self.kind {
            CollectibleKind::Diamond => {
                Quat::from_rotation_y(time * 2.0) * Quat::from_rotation_z((time * 1.5).sin() * 0.3)
            }
            CollectibleKind::Hoop { .. } => Quat::from_rotation_y((time * 0.8 + self.z_pos).sin() * 0.15),
            CollectibleKind::Boost => Quat::from_rotation_y(time * 3.0),
            CollectibleKind::Dot => Quat::IDENTITY,
        }
    }

    /// Type-specific pickup test against the ball
    pub fn is_touched(&self, time: f32, ball: Vec3, ball_radius: f32) -> bool {
        let center = self.position(time);
        let reach = ball_radius + self.kind.capture_margin();
        match self.kind {
            CollectibleKind::Hoop { inner_radius } => {
                passes_through_ring(ball, center, inner_radius, reach)
            }
            _ => sphere_overlap(ball, center, reach),
        }
    }
}

/// What a frame of pickup resolution produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectResult {
    pub points: u64,
    pub boost: bool,
    pub collected: Vec<CollectibleKind>,
}

/// Owns every live collectible
pub struct CollectibleSpawner {
    tuning: CollectibleTuning,
    items: Vec<Collectible>,
    next_id: u32,
}

impl CollectibleSpawner {
    pub fn new(tuning: CollectibleTuning) -> Self {
        Self {
            tuning,
            items: Vec::new(),
            next_id: 0,
        }
    }

    pub fn items(&self) -> &[Collectible] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn density(&self, level: u32) -> f32 {
        by_level(
            &self.tuning.density_by_level,
            level,
            self.tuning.default_density,
        )
    }

    fn push(&mut self, kind: CollectibleKind, x: f32, floor_y: f32, z: f32, scene: &mut dyn Scene) {
        let id = self.next_id;
        self.next_id += 1;
        let (geometry, material) = kind.visual();
        let placement = Placement::at(Vec3::new(x, floor_y + kind.height(), z));
        self.items.push(Collectible {
            id,
            kind,
            x,
            z_pos: z,
            base_y: floor_y,
            collected: false,
            collected_at: None,
            visible: true,
            placement,
            visual: VisualRef::spawn(scene, Geometry::Shared(geometry), material, placement),
        });
    }

    /// Place this segment's items. Returns the newly added ones.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn_for_segment<R: Rng + ?Sized>(
        &mut self,
        z_pos: f32,
        track_width: f32,
        level: u32,
        floor_y: f32,
        obstacle: Option<&Obstacle>,
        rng: &mut R,
        scene: &mut dyn Scene,
    ) -> &[Collectible] {
        let start = self.items.len();
        let density = self.density(level);
        // One lane for the whole segment so items never split across sides
        let lane = obstacle.map(|o| o.safe_lane(track_width, rng));

        if rng.random::<f32>() < density {
            let count = 4 + rng.random_range(0..3);
            let half = count as f32 * 0.5;
            let line_x = match lane {
                Some(x) => Some(x),
                None if rng.random_bool(0.5) => Some(clamp_lane((rng.random::<f32>() - 0.5) * 3.0)),
                None => None,
            };
            let wave_center = clamp_lane((rng.random::<f32>() - 0.5) * 2.0);
            for i in 0..count {
                let z = z_pos + (i as f32 - half) * DOT_SPACING;
                let x = line_x.unwrap_or_else(|| clamp_lane(wave_center + (i as f32 * 0.8).sin() * 1.5));
                self.push(CollectibleKind::Dot, x, floor_y, z, scene);
            }
        }

        if rng.random::<f32>() < density * self.tuning.diamond_scale {
            let x = lane.unwrap_or_else(|| clamp_lane((rng.random::<f32>() - 0.5) * 3.0));
            self.push(CollectibleKind::Diamond, x, floor_y, z_pos, scene);
        }

        if rng.random::<f32>() < density * self.tuning.hoop_scale {
            let kind = CollectibleKind::Hoop {
                inner_radius: HOOP_INNER_RADIUS,
            };
            self.push(kind, lane.unwrap_or(0.0), floor_y, z_pos, scene);
        }

        if level >= self.tuning.boost_min_level
            && rng.random::<f32>() < density * self.tuning.boost_scale
        {
            let x = lane.unwrap_or_else(|| clamp_lane((rng.random::<f32>() - 0.5) * 3.0));
            self.push(CollectibleKind::Boost, x, floor_y, z_pos, scene);
        }

        &self.items[start..]
    }

    /// Animate everything and resolve pickups against the ball.
    ///
    /// With `can_collect == false` items still animate but nothing is taken.
    pub fn update(
        &mut self,
        time: f32,
        ball: Vec3,
        ball_radius: f32,
        can_collect: bool,
        scene: &mut dyn Scene,
    ) -> CollectResult {
        let mut result = CollectResult::default();
        let fade = self.tuning.fade_duration.max(f32::EPSILON);

        for item in &mut self.items {
            if item.collected {
                if item.visible {
                    let elapsed = time - item.collected_at.unwrap_or(time);
                    let t = (elapsed / fade).min(1.0);
                    if t < 1.0 {
                        let placement = item.placement.with_scale(Vec3::splat(1.0 - t));
                        scene.place_visual(item.visual.handle, placement);
                    } else {
                        item.visible = false;
                        scene.place_visual(item.visual.handle, item.placement.hidden());
                    }
                }
                continue;
            }

            item.placement = Placement::at(item.position(time)).with_rotation(item.rotation(time));
            scene.place_visual(item.visual.handle, item.placement);

            if !can_collect || !item.is_touched(time, ball, ball_radius) {
                continue;
            }
            item.collected = true;
            item.collected_at = Some(time);
            result.points += item.points();
            result.boost |= item.kind == CollectibleKind::Boost;
            result.collected.push(item.kind);
        }

        result
    }

    /// Remove items behind the trailing margin, collected or not
    pub fn remove_old(&mut self, player_z: f32, scene: &mut dyn Scene) -> usize {
        let threshold = self.trailing_threshold(player_z);
        let before = self.items.len();
        self.items.retain(|item| {
            if item.z_pos > threshold {
                item.visual.release(scene);
                false
            } else {
                true
            }
        });
        before - self.items.len()
    }

    pub fn trailing_threshold(&self, player_z: f32) -> f32 {
        player_z + self.tuning.trailing_margin
    }

    pub fn reset(&mut self, scene: &mut dyn Scene) {
        for item in self.items.drain(..) {
            item.visual.release(scene);
        }
        self.next_id = 0;
    }
}
