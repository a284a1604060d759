//! The ball: placement, ghost mode, jumping, steering and respawn

use glam::Vec3;
use serde::Serialize;

use super::physics::{BodyHandle, PhysicsWorld, groups};
use crate::consts::*;
use crate::platform::{FrameInput, Geometry, MaterialKey, Placement, Scene, SharedGeometry, VisualRef};
use crate::tuning::PlayerTuning;

/// Ball mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BallMode {
    #[default]
    Normal,
    /// Invulnerable; passes through obstacles
    Ghost,
}

/// The player's ball
#[derive(Debug)]
pub struct Ball {
    body: BodyHandle,
    visual: VisualRef,
    pub radius: f32,
    mode: BallMode,
    ghost_remaining: f32,
    can_jump: bool,
    /// Seconds since the last ground/rail contact
    since_ground: f32,
    /// Launched by a jump and not yet landed
    airborne: bool,
    tuning: PlayerTuning,
}

impl Ball {
    pub fn spawn(position: Vec3, tuning: PlayerTuning, world: &mut PhysicsWorld, scene: &mut dyn Scene) -> Self {
        let body = world.create_ball(
            position,
            BALL_RADIUS,
            BALL_MASS,
            BALL_LINEAR_DAMPING,
            BALL_ANGULAR_DAMPING,
        );
        let visual = VisualRef::spawn(
            scene,
            Geometry::Shared(SharedGeometry::Ball),
            MaterialKey::Ball,
            Placement::at(position),
        );
        Self {
            body,
            visual,
            radius: BALL_RADIUS,
            mode: BallMode::Normal,
            ghost_remaining: 0.0,
            can_jump: true,
            since_ground: 0.0,
            airborne: false,
            tuning,
        }
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn mode(&self) -> BallMode {
        self.mode
    }

    pub fn is_ghost(&self) -> bool {
        self.mode == BallMode::Ghost
    }

    pub fn ghost_remaining(&self) -> f32 {
        self.ghost_remaining
    }

    pub fn ghost_duration(&self) -> f32 {
        self.tuning.ghost_duration
    }

    pub fn can_jump(&self) -> bool {
        self.can_jump
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne
    }

    /// Put the ball at rest at `position` in normal mode (run start)
    pub fn place(&mut self, position: Vec3, world: &mut PhysicsWorld, scene: &mut dyn Scene) {
        self.end_ghost(world, scene);
        world.set_ball_position(position);
        world.set_ball_velocity(Vec3::ZERO);
        world.zero_ball_angular_velocity();
        world.set_ball_force(Vec3::ZERO);
        self.can_jump = true;
        self.since_ground = 0.0;
        self.airborne = false;
        self.sync_visual(world, scene);
    }

    /// Enter ghost mode. No-op (returns false) if already a ghost.
    pub fn enter_ghost(&mut self, world: &mut PhysicsWorld, scene: &mut dyn Scene) -> bool {
        if self.is_ghost() {
            return false;
        }
        self.mode = BallMode::Ghost;
        self.ghost_remaining = self.tuning.ghost_duration;
        world.set_ball_filter(groups::ghost_filter());
        scene.set_material(self.visual.handle, MaterialKey::BallGhost);
        true
    }

    pub fn end_ghost(&mut self, world: &mut PhysicsWorld, scene: &mut dyn Scene) {
        let was_ghost = self.is_ghost();
        self.mode = BallMode::Normal;
        self.ghost_remaining = 0.0;
        world.set_ball_filter(groups::ball_filter());
        if was_ghost {
            scene.set_material(self.visual.handle, MaterialKey::Ball);
        }
    }

    /// Pulsing glow while a ghost, steady otherwise
    pub fn glow_intensity(&self) -> f32 {
        if self.is_ghost() {
            1.5 + (self.ghost_remaining * 8.0).sin() * 0.8
        } else {
            1.0
        }
    }

    /// Count down ghost mode and sync the visual. Returns true when ghost mode ended.
    pub fn update(&mut self, dt: f32, world: &mut PhysicsWorld, scene: &mut dyn Scene) -> bool {
        self.sync_visual(world, scene);
        if !self.is_ghost() {
            return false;
        }
        self.ghost_remaining -= dt;
        if self.ghost_remaining <= 0.0 {
            self.end_ghost(world, scene);
            return true;
        }
        false
    }

    fn sync_visual(&self, world: &PhysicsWorld, scene: &mut dyn Scene) {
        let placement = Placement::at(world.ball_position())
            .with_rotation(world.ball_rotation())
            .with_glow(self.glow_intensity());
        scene.place_visual(self.visual.handle, placement);
    }

    /// Apply pointer and key steering for this frame
    pub fn steer(&self, input: &FrameInput, dt: f32, world: &mut PhysicsWorld) {
        let dt = if dt > 0.0 { dt } else { FALLBACK_DT };
        let pos = world.ball_position();

        if let Some(target) = input.steer_to_world_x.filter(|x| x.is_finite()) {
            let target = target.clamp(-TRACK_MAX_X, TRACK_MAX_X);
            let mut vel = world.ball_velocity();
            vel.x = (target - pos.x) / dt;
            world.set_ball_velocity(vel);
        }

        let mut force = 0.0;
        if input.move_left && pos.x > -TRACK_MAX_X {
            force -= self.tuning.key_force;
        }
        if input.move_right && pos.x < TRACK_MAX_X {
            force += self.tuning.key_force;
        }
        world.set_ball_force(Vec3::new(force, 0.0, 0.0));
    }

    /// Consume a jump request. Returns true if the ball jumped.
    pub fn try_jump(&mut self, requested: bool, world: &mut PhysicsWorld) -> bool {
        if !requested || !self.can_jump {
            return false;
        }
        let mut vel = world.ball_velocity();
        vel.y = self.tuning.jump_up;
        vel.z -= self.tuning.jump_forward_boost;
        world.set_ball_velocity(vel);
        self.can_jump = false;
        self.airborne = true;
        // The jump uses up the grace window
        self.since_ground = self.tuning.coyote_time;
        true
    }

    /// A track or rail contact was reported this frame.
    ///
    /// Every contact restarts the grace clock. A contact while still rising
    /// from a jump does not land the ball, so the jump only comes back
    /// through [`Ball::tick_ground_timer`] inside the window.
    pub fn note_ground_contact(&mut self, vertical_velocity: f32) {
        self.since_ground = 0.0;
        if self.airborne && vertical_velocity > 0.0 {
            return;
        }
        self.airborne = false;
        self.can_jump = true;
    }

    /// Advance the coyote clock, re-arming the jump inside the grace window
    pub fn tick_ground_timer(&mut self, dt: f32) {
        self.since_ground += dt;
        if !self.can_jump && self.since_ground < self.tuning.coyote_time {
            self.can_jump = true;
        }
    }

    /// Drop the ball back on the track at `z`, rolling forward
    pub fn respawn(&mut self, z: f32, floor_y: f32, world: &mut PhysicsWorld, scene: &mut dyn Scene) {
        let position = Vec3::new(0.0, floor_y + self.radius, z);
        world.set_ball_position(position);
        world.set_ball_velocity(Vec3::new(0.0, 0.0, -self.tuning.respawn_forward_speed));
        world.zero_ball_angular_velocity();
        self.airborne = false;
        self.sync_visual(world, scene);
        log::debug!("respawned at z={:.1}", position.z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HeadlessScene;
    use crate::tuning::PhysicsTuning;

    fn setup() -> (Ball, PhysicsWorld, HeadlessScene) {
        let mut world = PhysicsWorld::new(&PhysicsTuning::default());
        let mut scene = HeadlessScene::new();
        let ball = Ball::spawn(Vec3::new(0.0, 1.0, 0.0), PlayerTuning::default(), &mut world, &mut scene);
        (ball, world, scene)
    }

    #[test]
    fn test_ghost_reentry_does_not_extend_timer() {
        let (mut ball, mut world, mut scene) = setup();
        assert!(ball.enter_ghost(&mut world, &mut scene));
        ball.update(1.0, &mut world, &mut scene);
        assert!((ball.ghost_remaining() - 2.0).abs() < 1e-5);

        assert!(!ball.enter_ghost(&mut world, &mut scene));
        assert!((ball.ghost_remaining() - 2.0).abs() < 1e-5);
        assert_eq!(world.ball_filter(), Some(groups::ghost_filter()));
    }

    #[test]
    fn test_ghost_expires_and_restores_mask_and_material() {
        let (mut ball, mut world, mut scene) = setup();
        ball.enter_ghost(&mut world, &mut scene);
        assert_eq!(scene.get(ball.visual.handle).unwrap().material, MaterialKey::BallGhost);

        let mut ended = false;
        for _ in 0..40 {
            ended |= ball.update(0.1, &mut world, &mut scene);
        }
        assert!(ended);
        assert_eq!(ball.mode(), BallMode::Normal);
        assert_eq!(world.ball_filter(), Some(groups::ball_filter()));
        assert_eq!(scene.get(ball.visual.handle).unwrap().material, MaterialKey::Ball);
        assert_eq!(ball.glow_intensity(), 1.0);
        assert_eq!(scene.get(ball.visual.handle).unwrap().placement.glow, 1.0);
    }

    #[test]
    fn test_ghost_glow_reaches_the_scene() {
        let (mut ball, mut world, mut scene) = setup();
        ball.enter_ghost(&mut world, &mut scene);
        ball.update(0.1, &mut world, &mut scene);
        let glow = scene.get(ball.visual.handle).unwrap().placement.glow;
        // Synced before the countdown, so the full-duration pulse
        let expected = 1.5 + (3.0f32 * 8.0).sin() * 0.8;
        assert!((glow - expected).abs() < 1e-5);
        assert!(glow != 1.0);
    }

    #[test]
    fn test_jump_then_rearm_on_landing() {
        let (mut ball, mut world, _scene) = setup();
        assert!(ball.try_jump(true, &mut world));
        let v = world.ball_velocity();
        assert_eq!(v.y, 12.0);
        assert_eq!(v.z, -3.0);
        assert!(!ball.can_jump());

        // No double jump inside the coyote window right after take-off
        ball.tick_ground_timer(0.016);
        assert!(!ball.try_jump(true, &mut world));

        // Contact while still rising is ignored
        ball.note_ground_contact(5.0);
        assert!(ball.is_airborne());

        ball.note_ground_contact(-1.0);
        assert!(!ball.is_airborne());
        assert!(ball.try_jump(true, &mut world));
    }

    #[test]
    fn test_missed_landing_rearms_inside_grace_window() {
        let (mut ball, mut world, _scene) = setup();
        assert!(ball.try_jump(true, &mut world));

        // Touching down while the body still reports upward speed
        ball.note_ground_contact(5.0);
        assert!(!ball.can_jump());
        ball.tick_ground_timer(0.05);
        assert!(ball.try_jump(true, &mut world));

        // Same miss, but the window has passed by the next frame
        ball.note_ground_contact(5.0);
        ball.tick_ground_timer(0.25);
        assert!(!ball.can_jump());
        assert!(!ball.try_jump(true, &mut world));
    }

    #[test]
    fn test_pointer_steering_targets_clamped_x() {
        let (ball, mut world, _scene) = setup();
        let input = FrameInput {
            steer_to_world_x: Some(10.0),
            ..FrameInput::default()
        };
        ball.steer(&input, 0.02, &mut world);
        assert!((world.ball_velocity().x - TRACK_MAX_X / 0.02).abs() < 1e-2);

        // Zero dt falls back instead of dividing by zero
        ball.steer(&input, 0.0, &mut world);
        assert!(world.ball_velocity().x.is_finite());
    }

    #[test]
    fn test_respawn_centred_with_forward_speed() {
        let (mut ball, mut world, mut scene) = setup();
        ball.respawn(-120.0, 4.0, &mut world, &mut scene);
        assert!(world.ball_position().abs_diff_eq(Vec3::new(0.0, 4.65, -120.0), 1e-5));
        assert_eq!(world.ball_velocity(), Vec3::new(0.0, 0.0, -8.0));
    }
}
