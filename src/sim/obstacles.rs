//! Obstacle spawning and kinematic animation
//!
//! Four archetypes, one tagged enum. Moving obstacles are driven by
//! `amplitude * sin(time * speed + phase)`, written to the physics body and the
//! visual in the same call so the two never drift apart.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;
use serde::Serialize;

use super::physics::{BodyHandle, PhysicsWorld, groups};
use crate::clamp_lane;
use crate::consts::SAFE_X;
use crate::platform::{Geometry, MaterialKey, Placement, Scene, SharedGeometry, VisualRef};
use crate::tuning::{ObstacleTuning, by_level};

const WALL_HEIGHT: f32 = 1.8;
const WALL_DEPTH: f32 = 0.6;
const ARM_THICKNESS: f32 = 0.5;
const ARM_AMPLITUDE: f32 = 3.0;
const BLOCK_SIZE: f32 = 1.4;
const BAR_THICKNESS: f32 = 0.5;
const BAR_GAP: f32 = 2.2;

/// Variant-specific obstacle parameters, frozen at spawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ObstacleKind {
    /// Fixed box covering part of the lane
    StaticWall { x_offset: f32, wall_width: f32 },
    /// Horizontal bar swinging in X
    SwingingArm {
        arm_length: f32,
        amplitude: f32,
        speed: f32,
        phase: f32,
        arm_y: f32,
    },
    /// Cube sliding across most of the width
    SlidingBlock {
        range: f32,
        speed: f32,
        phase: f32,
        base_y: f32,
    },
    /// Two side sections with a central gap
    LowBar {
        gap_width: f32,
        section_width: f32,
        bar_y: f32,
    },
}

impl ObstacleKind {
    pub fn is_moving(&self) -> bool {
        matches!(
            self,
            ObstacleKind::SwingingArm { .. } | ObstacleKind::SlidingBlock { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObstacleKind::StaticWall { .. } => "static_wall",
            ObstacleKind::SwingingArm { .. } => "swinging_arm",
            ObstacleKind::SlidingBlock { .. } => "sliding_block",
            ObstacleKind::LowBar { .. } => "low_bar",
        }
    }
}

/// A live obstacle
#[derive(Debug)]
pub struct Obstacle {
    pub id: u32,
    pub z_pos: f32,
    pub floor_y: f32,
    pub kind: ObstacleKind,
    pub active: bool,
    /// Current lateral position of the moving part
    x: f32,
    bodies: Vec<BodyHandle>,
    visuals: Vec<VisualRef>,
    /// Body and visual that follow the oscillation, with the visual's base placement
    moving: Option<(BodyHandle, VisualRef, Placement)>,
}

impl Obstacle {
    /// Lateral position of the obstacle at `time`
    pub fn lateral_offset(&self, time: f32) -> f32 {
        match self.kind {
            ObstacleKind::StaticWall { x_offset, .. } => x_offset,
            ObstacleKind::SwingingArm {
                amplitude,
                speed,
                phase,
                ..
            } => amplitude * (time * speed + phase).sin(),
            ObstacleKind::SlidingBlock {
                range, speed, phase, ..
            } => range * (time * speed + phase).sin(),
            ObstacleKind::LowBar { .. } => 0.0,
        }
    }

    /// Last position written by `update`
    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn bodies(&self) -> &[BodyHandle] {
        &self.bodies
    }

    pub fn visual_count(&self) -> usize {
        self.visuals.len() + usize::from(self.moving.is_some())
    }

    /// Lateral coordinate the ball can use to get past this obstacle.
    ///
    /// Walls: middle of the wider shoulder. Low bars: the central gap.
    /// Oscillating hazards sweep the middle, so a random rail edge.
    pub fn safe_lane<R: Rng + ?Sized>(&self, track_width: f32, rng: &mut R) -> f32 {
        match self.kind {
            ObstacleKind::StaticWall {
                x_offset,
                wall_width,
            } => {
                let half_track = track_width * 0.5;
                let wall_left = x_offset - wall_width * 0.5;
                let wall_right = x_offset + wall_width * 0.5;
                let left_space = wall_left + half_track;
                let right_space = half_track - wall_right;
                if left_space > right_space {
                    clamp_lane((wall_left - half_track) * 0.5)
                } else {
                    clamp_lane((wall_right + half_track) * 0.5)
                }
            }
            ObstacleKind::LowBar { .. } => 0.0,
            ObstacleKind::SwingingArm { .. } | ObstacleKind::SlidingBlock { .. } => {
                if rng.random_bool(0.5) {
                    -SAFE_X
                } else {
                    SAFE_X
                }
            }
        }
    }

    /// Lateral intervals `(min, max)` the obstacle occupies at `time`
    pub fn blocking_extents(&self, time: f32, track_width: f32) -> Vec<(f32, f32)> {
        let x = self.lateral_offset(time);
        match self.kind {
            ObstacleKind::StaticWall { wall_width, .. } => {
                vec![(x - wall_width * 0.5, x + wall_width * 0.5)]
            }
            ObstacleKind::SwingingArm { arm_length, .. } => {
                vec![(x - arm_length * 0.5, x + arm_length * 0.5)]
            }
            ObstacleKind::SlidingBlock { .. } => {
                vec![(x - BLOCK_SIZE * 0.5, x + BLOCK_SIZE * 0.5)]
            }
            ObstacleKind::LowBar { gap_width, .. } => {
                let half = track_width * 0.5;
                vec![(-half, -gap_width * 0.5), (gap_width * 0.5, half)]
            }
        }
    }

    fn release(self, world: &mut PhysicsWorld, scene: &mut dyn Scene) {
        for body in self.bodies {
            world.remove_body(body);
        }
        for visual in self.visuals {
            visual.release(scene);
        }
        if let Some((body, visual, _)) = self.moving {
            world.remove_body(body);
            visual.release(scene);
        }
    }
}

/// Owns every live obstacle
pub struct ObstacleSpawner {
    tuning: ObstacleTuning,
    obstacles: Vec<Obstacle>,
    next_id: u32,
}

impl ObstacleSpawner {
    pub fn new(tuning: ObstacleTuning) -> Self {
        Self {
            tuning,
            obstacles: Vec::new(),
            next_id: 0,
        }
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn body_count(&self) -> usize {
        self.obstacles
            .iter()
            .map(|o| o.bodies.len() + usize::from(o.moving.is_some()))
            .sum()
    }

    pub fn visual_count(&self) -> usize {
        self.obstacles.iter().map(Obstacle::visual_count).sum()
    }

    /// Chance a segment at `level` gets an obstacle
    pub fn frequency(&self, level: u32) -> f32 {
        by_level(
            &self.tuning.frequency_by_level,
            level,
            self.tuning.default_frequency,
        )
    }

    /// Maybe place an obstacle for the segment at `z_pos`
    #[allow(clippy::too_many_arguments)]
    pub fn spawn<R: Rng + ?Sized>(
        &mut self,
        z_pos: f32,
        track_width: f32,
        level: u32,
        floor_y: f32,
        rng: &mut R,
        world: &mut PhysicsWorld,
        scene: &mut dyn Scene,
    ) -> Option<&Obstacle> {
        if rng.random::<f32>() >= self.frequency(level) {
            return None;
        }

        let [wall, arm, block] = self.tuning.variant_thresholds;
        let roll = rng.random::<f32>();
        let kind = if roll < wall {
            let wall_width = track_width * 0.35 + rng.random::<f32>() * track_width * 0.2;
            let x_offset = (rng.random::<f32>() - 0.5) * (track_width - wall_width) * 0.5;
            ObstacleKind::StaticWall {
                x_offset,
                wall_width,
            }
        } else if roll < arm {
            ObstacleKind::SwingingArm {
                arm_length: track_width * 0.65,
                amplitude: ARM_AMPLITUDE,
                speed: 1.5 + rng.random::<f32>() * 0.5,
                phase: rng.random::<f32>() * TAU,
                arm_y: floor_y + 0.7,
            }
        } else if roll < block {
            ObstacleKind::SlidingBlock {
                range: track_width * 0.5 - BLOCK_SIZE,
                speed: 2.0 + rng.random::<f32>(),
                phase: rng.random::<f32>() * TAU,
                base_y: floor_y + BLOCK_SIZE * 0.5,
            }
        } else {
            ObstacleKind::LowBar {
                gap_width: BAR_GAP,
                section_width: (track_width - BAR_GAP) * 0.5,
                bar_y: floor_y + 0.6,
            }
        };

        let id = self.next_id;
        self.next_id += 1;
        let obstacle = build(id, z_pos, floor_y, track_width, kind, world, scene);
        log::debug!("obstacle {} {} at z={:.1}", id, kind.name(), z_pos);
        self.obstacles.push(obstacle);
        self.obstacles.last()
    }

    /// Drive every moving obstacle to its position at `time`
    pub fn update(&mut self, time: f32, world: &mut PhysicsWorld, scene: &mut dyn Scene) {
        for obs in self.obstacles.iter_mut().filter(|o| o.active) {
            if !obs.kind.is_moving() {
                continue;
            }
            let x = obs.lateral_offset(time);
            obs.x = x;
            if let Some((body, visual, base)) = &obs.moving {
                world.set_kinematic_x(*body, x);
                let mut placement = *base;
                placement.position.x = x;
                scene.place_visual(visual.handle, placement);
            }
        }
    }

    /// Retire obstacles more than the trailing margin behind the ball
    pub fn remove_old(&mut self, player_z: f32, world: &mut PhysicsWorld, scene: &mut dyn Scene) -> usize {
        let threshold = self.trailing_threshold(player_z);
        let (old, keep): (Vec<_>, Vec<_>) = self
            .obstacles
            .drain(..)
            .partition(|o| o.z_pos > threshold);
        self.obstacles = keep;
        let removed = old.len();
        for obs in old {
            obs.release(world, scene);
        }
        removed
    }

    pub fn trailing_threshold(&self, player_z: f32) -> f32 {
        player_z + self.tuning.trailing_margin
    }

    pub fn reset(&mut self, world: &mut PhysicsWorld, scene: &mut dyn Scene) {
        for obs in self.obstacles.drain(..) {
            obs.release(world, scene);
        }
        self.next_id = 0;
    }
}

fn cuboid(half_extents: Vec3) -> Geometry {
    Geometry::Cuboid { half_extents }
}

/// Unit-height shared pillar scaled to `height`, standing on `floor_y`
fn pillar(scene: &mut dyn Scene, x: f32, floor_y: f32, z: f32, height: f32, material: MaterialKey) -> VisualRef {
    VisualRef::spawn(
        scene,
        Geometry::Shared(SharedGeometry::Pillar),
        material,
        Placement::at(Vec3::new(x, floor_y + height * 0.5, z)).with_scale(Vec3::new(1.0, height, 1.0)),
    )
}

fn build(
    id: u32,
    z: f32,
    floor_y: f32,
    track_width: f32,
    kind: ObstacleKind,
    world: &mut PhysicsWorld,
    scene: &mut dyn Scene,
) -> Obstacle {
    let material = world.default_material();
    let mut bodies = Vec::new();
    let mut visuals = Vec::new();
    let mut moving = None;
    let mut x = 0.0;

    match kind {
        ObstacleKind::StaticWall {
            x_offset,
            wall_width,
        } => {
            let half = Vec3::new(wall_width * 0.5, WALL_HEIGHT * 0.5, WALL_DEPTH * 0.5);
            let center = Vec3::new(x_offset, floor_y + WALL_HEIGHT * 0.5, z);
            bodies.push(world.add_static_box(center, half, 0.0, groups::OBSTACLE, material));
            visuals.push(VisualRef::spawn(
                scene,
                cuboid(half),
                MaterialKey::Wall,
                Placement::at(center),
            ));
            x = x_offset;
        }
        ObstacleKind::SwingingArm {
            arm_length, arm_y, ..
        } => {
            let pillar_height = arm_y - floor_y + 1.5;
            visuals.push(pillar(scene, 0.0, floor_y, z, pillar_height, MaterialKey::Arm));

            let half = Vec3::new(arm_length * 0.5, ARM_THICKNESS * 0.5, ARM_THICKNESS * 0.5);
            let center = Vec3::new(0.0, arm_y, z);
            let body = world.add_kinematic_box(center, half, groups::OBSTACLE, material);
            let base = Placement::at(center);
            let visual = VisualRef::spawn(scene, cuboid(half), MaterialKey::Arm, base);
            moving = Some((body, visual, base));
        }
        ObstacleKind::SlidingBlock { base_y, .. } => {
            let half = Vec3::splat(BLOCK_SIZE * 0.5);
            let center = Vec3::new(0.0, base_y, z);
            let body = world.add_kinematic_box(center, half, groups::OBSTACLE, material);
            let base = Placement::at(center);
            let visual = VisualRef::spawn(
                scene,
                Geometry::Shared(SharedGeometry::BlockCube),
                MaterialKey::Block,
                base,
            );
            moving = Some((body, visual, base));
        }
        ObstacleKind::LowBar {
            gap_width,
            section_width,
            bar_y,
        } => {
            let half = Vec3::new(section_width * 0.5, BAR_THICKNESS * 0.5, BAR_THICKNESS * 0.5);
            let offset = gap_width * 0.5 + section_width * 0.5;
            for side in [-1.0, 1.0] {
                let center = Vec3::new(side * offset, bar_y, z);
                bodies.push(world.add_static_box(center, half, 0.0, groups::OBSTACLE, material));
                visuals.push(VisualRef::spawn(
                    scene,
                    cuboid(half),
                    MaterialKey::Bar,
                    Placement::at(center),
                ));
            }
            let pillar_height = bar_y - floor_y + BAR_THICKNESS;
            for side in [-1.0, 1.0] {
                visuals.push(pillar(
                    scene,
                    side * track_width * 0.5,
                    floor_y,
                    z,
                    pillar_height,
                    MaterialKey::Bar,
                ));
            }
        }
    }

    Obstacle {
        id,
        z_pos: z,
        floor_y,
        kind,
        active: true,
        x,
        bodies,
        visuals,
        moving,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::TRACK_WIDTH;
    use crate::platform::HeadlessScene;
    use crate::tuning::PhysicsTuning;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn always(thresholds: [f32; 3]) -> ObstacleSpawner {
        ObstacleSpawner::new(ObstacleTuning {
            frequency_by_level: vec![1.0],
            variant_thresholds: thresholds,
            ..ObstacleTuning::default()
        })
    }

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&PhysicsTuning::default())
    }

    #[test]
    fn test_frequency_table_and_fallback() {
        let spawner = ObstacleSpawner::new(ObstacleTuning::default());
        assert_eq!(spawner.frequency(1), 0.15);
        assert_eq!(spawner.frequency(7), 0.9);
        assert_eq!(spawner.frequency(0), 0.3);
        assert_eq!(spawner.frequency(99), 0.3);
    }

    #[test]
    fn test_zero_frequency_never_spawns() {
        let mut spawner = ObstacleSpawner::new(ObstacleTuning {
            frequency_by_level: vec![0.0],
            ..ObstacleTuning::default()
        });
        let (mut world, mut scene) = (world(), HeadlessScene::new());
        let mut rng = Pcg32::seed_from_u64(1);
        for i in 0..50 {
            let z = -(i as f32) * 24.0;
            assert!(
                spawner
                    .spawn(z, TRACK_WIDTH, 1, 0.0, &mut rng, &mut world, &mut scene)
                    .is_none()
            );
        }
        assert!(spawner.is_empty());
    }

    #[test]
    fn test_wall_bounds_and_safe_lane() {
        let mut spawner = always([1.0, 1.0, 1.0]);
        let (mut world, mut scene) = (world(), HeadlessScene::new());
        let mut rng = Pcg32::seed_from_u64(11);
        for i in 0..40 {
            let obs = spawner
                .spawn(-(i as f32) * 24.0, TRACK_WIDTH, 1, 5.0, &mut rng, &mut world, &mut scene)
                .unwrap();
            let ObstacleKind::StaticWall {
                x_offset,
                wall_width,
            } = obs.kind
            else {
                panic!("expected a wall");
            };
            assert!(wall_width >= TRACK_WIDTH * 0.35 - 1e-4);
            assert!(wall_width <= TRACK_WIDTH * 0.55 + 1e-4);
            assert!(x_offset.abs() <= (TRACK_WIDTH - wall_width) * 0.25 + 1e-5);

            let lane = obs.safe_lane(TRACK_WIDTH, &mut rng);
            assert!(lane.abs() <= SAFE_X);
            for (lo, hi) in obs.blocking_extents(0.0, TRACK_WIDTH) {
                assert!(lane < lo || lane > hi, "lane {lane} inside wall [{lo}, {hi}]");
            }
        }
    }

    #[test]
    fn test_low_bar_lane_is_gap() {
        let mut spawner = always([0.0, 0.0, 0.0]);
        let (mut world, mut scene) = (world(), HeadlessScene::new());
        let mut rng = Pcg32::seed_from_u64(2);
        let obs = spawner
            .spawn(0.0, TRACK_WIDTH, 1, 0.0, &mut rng, &mut world, &mut scene)
            .unwrap();
        assert_eq!(obs.kind.name(), "low_bar");
        assert_eq!(obs.bodies().len(), 2);
        assert_eq!(obs.safe_lane(TRACK_WIDTH, &mut rng), 0.0);
        let extents = obs.blocking_extents(0.0, TRACK_WIDTH);
        assert_eq!(extents, vec![(-4.5, -1.1), (1.1, 4.5)]);
    }

    #[test]
    fn test_moving_obstacle_body_and_visual_in_sync() {
        let mut spawner = always([0.0, 0.0, 1.0]);
        let (mut world, mut scene) = (world(), HeadlessScene::new());
        let mut rng = Pcg32::seed_from_u64(5);
        spawner.spawn(-48.0, TRACK_WIDTH, 1, 2.0, &mut rng, &mut world, &mut scene);

        for step in 0..10 {
            let t = step as f32 * 0.37;
            spawner.update(t, &mut world, &mut scene);
            let obs = &spawner.obstacles()[0];
            let expected = obs.lateral_offset(t);
            let ObstacleKind::SlidingBlock { range, .. } = obs.kind else {
                panic!("expected a sliding block");
            };
            assert!(expected.abs() <= range + 1e-5);

            let (body, visual, _) = obs.moving.as_ref().unwrap();
            let body_x = world.body_translation(*body).unwrap().x;
            let visual_x = scene.get(visual.handle).unwrap().placement.position.x;
            assert!((body_x - expected).abs() < 1e-5);
            assert_eq!(body_x, visual_x);
        }
    }

    #[test]
    fn test_moving_lane_is_rail_edge() {
        let mut spawner = always([0.0, 1.0, 1.0]);
        let (mut world, mut scene) = (world(), HeadlessScene::new());
        let mut rng = Pcg32::seed_from_u64(9);
        let obs = spawner
            .spawn(0.0, TRACK_WIDTH, 1, 0.0, &mut rng, &mut world, &mut scene)
            .unwrap();
        assert!(obs.kind.is_moving());
        assert_eq!(obs.safe_lane(TRACK_WIDTH, &mut rng).abs(), SAFE_X);
    }

    #[test]
    fn test_remove_old_and_reset_release_everything() {
        let mut spawner = always([0.35, 0.55, 0.80]);
        let (mut world, mut scene) = (world(), HeadlessScene::new());
        let mut rng = Pcg32::seed_from_u64(21);
        for i in 0..30 {
            spawner.spawn(-(i as f32) * 24.0, TRACK_WIDTH, 1, 0.0, &mut rng, &mut world, &mut scene);
        }
        assert_eq!(world.body_count(), spawner.body_count());
        assert_eq!(scene.live_count(), spawner.visual_count());

        let player_z = -400.0;
        spawner.remove_old(player_z, &mut world, &mut scene);
        let threshold = spawner.trailing_threshold(player_z);
        assert!(spawner.obstacles().iter().all(|o| o.z_pos <= threshold));
        assert_eq!(world.body_count(), spawner.body_count());
        assert_eq!(scene.live_count(), spawner.visual_count());

        spawner.reset(&mut world, &mut scene);
        spawner.reset(&mut world, &mut scene);
        assert!(spawner.is_empty());
        assert_eq!(world.body_count(), 0);
        assert_eq!(scene.live_count(), 0);
        assert_eq!(scene.shared_disposals(), 0);
    }
}
