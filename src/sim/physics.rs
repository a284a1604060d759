//! Rigid-body world adapter
//!
//! Wraps a rapier pipeline behind the handful of operations the game needs:
//! static/kinematic boxes, the ball body, fixed-substep stepping and contact
//! delivery classified by collision group.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use glam::{Quat, Vec3};
use rapier3d::prelude::*;

use crate::tuning::PhysicsTuning;

/// Handle to a body in the world
pub type BodyHandle = RigidBodyHandle;

/// Collision group bits
pub mod groups {
    use rapier3d::prelude::Group;

    pub const TRACK: Group = Group::GROUP_1;
    pub const BALL: Group = Group::GROUP_2;
    pub const OBSTACLE: Group = Group::GROUP_3;
    /// Reserved: collectibles use proximity tests, never physical contact
    pub const COLLECTIBLE: Group = Group::GROUP_4;
    pub const RAIL: Group = Group::GROUP_5;

    /// What the ball collides with normally
    pub fn ball_filter() -> Group {
        TRACK | OBSTACLE | RAIL
    }

    /// What the ball collides with in ghost mode
    pub fn ghost_filter() -> Group {
        TRACK | RAIL
    }
}

/// What the ball touched, by the other collider's group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Track,
    Rail,
    Obstacle,
    Other,
}

impl ContactKind {
    pub fn from_group(memberships: Group) -> Self {
        if memberships.intersects(groups::OBSTACLE) {
            ContactKind::Obstacle
        } else if memberships.intersects(groups::TRACK) {
            ContactKind::Track
        } else if memberships.intersects(groups::RAIL) {
            ContactKind::Rail
        } else {
            ContactKind::Other
        }
    }

    /// Contacts that re-arm the jump
    pub fn is_ground(self) -> bool {
        matches!(self, ContactKind::Track | ContactKind::Rail)
    }
}

/// A contact involving the ball
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    pub kind: ContactKind,
    pub other: Option<BodyHandle>,
}

/// Surface response for a collider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMaterial {
    pub friction: f32,
    pub restitution: f32,
}

#[inline]
pub fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

#[inline]
pub fn to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

/// The physics world
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    fixed_dt: f32,
    max_substeps: u32,
    accumulator: f32,
    default_material: SurfaceMaterial,
    track_material: SurfaceMaterial,
    ball: Option<(RigidBodyHandle, ColliderHandle)>,
    /// Obstacle colliders touching the ball after the last substep
    touching: HashSet<ColliderHandle>,
    contacts: Vec<ContactEvent>,
}

impl PhysicsWorld {
    pub fn new(tuning: &PhysicsTuning) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = tuning.fixed_dt;
        integration_parameters.num_solver_iterations =
            NonZeroUsize::new(tuning.solver_iterations).unwrap_or(NonZeroUsize::MIN);

        Self {
            gravity: vector![0.0, -tuning.gravity, 0.0],
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            fixed_dt: tuning.fixed_dt,
            max_substeps: tuning.max_substeps.max(1),
            accumulator: 0.0,
            default_material: SurfaceMaterial {
                friction: tuning.default_friction,
                restitution: tuning.default_restitution,
            },
            track_material: SurfaceMaterial {
                friction: tuning.track_friction,
                restitution: tuning.track_restitution,
            },
            ball: None,
            touching: HashSet::new(),
            contacts: Vec::new(),
        }
    }

    pub fn default_material(&self) -> SurfaceMaterial {
        self.default_material
    }

    pub fn track_material(&self) -> SurfaceMaterial {
        self.track_material
    }

    /// Number of live bodies (ball included)
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle)
    }

    // --- Stepping ---

    /// Advance by a variable frame `dt` using fixed internal substeps.
    ///
    /// Returns the number of substeps taken. Time beyond `max_substeps` is
    /// dropped rather than carried (no spiral of death).
    pub fn step(&mut self, dt: f32) -> u32 {
        self.accumulator += dt.max(0.0);

        let mut substeps = 0;
        while self.accumulator >= self.fixed_dt && substeps < self.max_substeps {
            self.step_fixed(self.fixed_dt);
            self.accumulator -= self.fixed_dt;
            substeps += 1;
        }
        if self.accumulator >= self.fixed_dt {
            self.accumulator = 0.0;
        }
        substeps
    }

    /// Run exactly one substep of the given length (settling, tests)
    pub fn step_fixed(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        self.collect_contacts();
    }

    /// Gather ball contacts from the narrow phase.
    ///
    /// Track/rail contacts are reported every substep they persist; obstacle
    /// contacts only on the substep they begin.
    fn collect_contacts(&mut self) {
        let Some((_, ball_collider)) = self.ball else {
            return;
        };

        let mut touching_now = HashSet::new();
        for pair in self.narrow_phase.contact_pairs_with(ball_collider) {
            if !pair.has_any_active_contact {
                continue;
            }
            let other = if pair.collider1 == ball_collider {
                pair.collider2
            } else {
                pair.collider1
            };
            let Some(collider) = self.colliders.get(other) else {
                continue;
            };
            let kind = ContactKind::from_group(collider.collision_groups().memberships);
            let event = ContactEvent {
                kind,
                other: collider.parent(),
            };
            if kind == ContactKind::Obstacle {
                touching_now.insert(other);
                if !self.touching.contains(&other) {
                    self.contacts.push(event);
                }
            } else {
                self.contacts.push(event);
            }
        }
        self.touching = touching_now;
    }

    /// Take every contact reported since the last drain
    pub fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.contacts)
    }

    /// Forget accumulated time and pending contacts (run reset)
    pub fn clear_transients(&mut self) {
        self.accumulator = 0.0;
        self.contacts.clear();
        self.touching.clear();
    }

    // --- Static and kinematic geometry ---

    /// Fixed box, optionally tilted about X, colliding only with the ball
    pub fn add_static_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        tilt_x: f32,
        group: Group,
        material: SurfaceMaterial,
    ) -> BodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(to_vector(center))
            .rotation(vector![tilt_x, 0.0, 0.0])
            .build();
        self.insert_box(body, half_extents, group, material)
    }

    /// Position-driven kinematic box (moving obstacles)
    pub fn add_kinematic_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        group: Group,
        material: SurfaceMaterial,
    ) -> BodyHandle {
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(to_vector(center))
            .build();
        self.insert_box(body, half_extents, group, material)
    }

    fn insert_box(
        &mut self,
        body: RigidBody,
        half: Vec3,
        group: Group,
        material: SurfaceMaterial,
    ) -> BodyHandle {
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::cuboid(half.x, half.y, half.z)
            .collision_groups(InteractionGroups::new(group, groups::BALL))
            .friction(material.friction)
            .restitution(material.restitution)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Move a kinematic body's X immediately (visual and body stay identical)
    pub fn set_kinematic_x(&mut self, handle: BodyHandle, x: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            let mut t = *body.translation();
            t.x = x;
            body.set_translation(t, true);
        }
    }

    pub fn body_translation(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| to_vec3(b.translation()))
    }

    /// Remove a body and its colliders
    pub fn remove_body(&mut self, handle: BodyHandle) {
        let removed = self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        if removed.is_none() {
            log::warn!("remove_body: unknown body {:?}", handle);
        }
    }

    // --- Ball ---

    /// Create the ball body. There is only ever one.
    pub fn create_ball(
        &mut self,
        position: Vec3,
        radius: f32,
        mass: f32,
        linear_damping: f32,
        angular_damping: f32,
    ) -> BodyHandle {
        if let Some((old, _)) = self.ball.take() {
            self.remove_body(old);
        }

        let body = RigidBodyBuilder::dynamic()
            .translation(to_vector(position))
            .linear_damping(linear_damping)
            .angular_damping(angular_damping)
            .ccd_enabled(true)
            .can_sleep(false)
            .build();
        let handle = self.bodies.insert(body);

        // Min-combine with unit coefficients: the other surface's material wins,
        // which is how per-pair contact materials are expressed here.
        let collider = ColliderBuilder::ball(radius)
            .mass(mass)
            .friction(1.0)
            .restitution(1.0)
            .friction_combine_rule(CoefficientCombineRule::Min)
            .restitution_combine_rule(CoefficientCombineRule::Min)
            .collision_groups(InteractionGroups::new(groups::BALL, groups::ball_filter()))
            .build();
        let collider = self
            .colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        self.ball = Some((handle, collider));
        handle
    }

    fn ball_body(&self) -> Option<&RigidBody> {
        self.ball.and_then(|(h, _)| self.bodies.get(h))
    }

    fn ball_body_mut(&mut self) -> Option<&mut RigidBody> {
        match self.ball {
            Some((h, _)) => self.bodies.get_mut(h),
            None => None,
        }
    }

    pub fn ball_position(&self) -> Vec3 {
        self.ball_body()
            .map(|b| to_vec3(b.translation()))
            .unwrap_or(Vec3::ZERO)
    }

    pub fn ball_rotation(&self) -> Quat {
        self.ball_body()
            .map(|b| {
                let c = b.rotation().coords;
                Quat::from_xyzw(c.x, c.y, c.z, c.w)
            })
            .unwrap_or(Quat::IDENTITY)
    }

    pub fn ball_velocity(&self) -> Vec3 {
        self.ball_body()
            .map(|b| to_vec3(b.linvel()))
            .unwrap_or(Vec3::ZERO)
    }

    pub fn set_ball_velocity(&mut self, velocity: Vec3) {
        if let Some(body) = self.ball_body_mut() {
            body.set_linvel(to_vector(velocity), true);
        }
    }

    pub fn set_ball_position(&mut self, position: Vec3) {
        if let Some(body) = self.ball_body_mut() {
            body.set_translation(to_vector(position), true);
        }
    }

    pub fn zero_ball_angular_velocity(&mut self) {
        if let Some(body) = self.ball_body_mut() {
            body.set_angvel(vector![0.0, 0.0, 0.0], true);
        }
    }

    /// Replace the persistent external force on the ball
    pub fn set_ball_force(&mut self, force: Vec3) {
        if let Some(body) = self.ball_body_mut() {
            body.reset_forces(true);
            if force != Vec3::ZERO {
                body.add_force(to_vector(force), true);
            }
        }
    }

    /// Change which groups the ball collides with
    pub fn set_ball_filter(&mut self, filter: Group) {
        if let Some((_, collider)) = self.ball {
            if let Some(c) = self.colliders.get_mut(collider) {
                c.set_collision_groups(InteractionGroups::new(groups::BALL, filter));
            }
        }
        if !filter.intersects(groups::OBSTACLE) {
            self.touching.clear();
        }
    }

    pub fn ball_filter(&self) -> Option<Group> {
        self.ball
            .and_then(|(_, c)| self.colliders.get(c))
            .map(|c| c.collision_groups().filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&PhysicsTuning::default())
    }

    fn floor(world: &mut PhysicsWorld) -> BodyHandle {
        let material = world.track_material();
        world.add_static_box(
            Vec3::new(0.0, -1.5, 0.0),
            Vec3::new(5.0, 1.5, 50.0),
            0.0,
            groups::TRACK,
            material,
        )
    }

    #[test]
    fn test_substeps_decouple_frame_dt() {
        let mut world = world();
        assert_eq!(world.step(1.0 / 60.0), 2);
        // Half a substep carries over
        assert_eq!(world.step(1.0 / 240.0), 0);
        assert_eq!(world.step(1.0 / 240.0), 1);
        // Huge frames are capped
        assert_eq!(world.step(1.0), 5);
        assert_eq!(world.step(0.0), 0);
    }

    #[test]
    fn test_ball_rests_on_floor_and_reports_ground() {
        let mut world = world();
        floor(&mut world);
        world.create_ball(Vec3::new(0.0, 2.0, 0.0), 0.65, 5.0, 0.2, 0.3);

        let mut grounded = false;
        for _ in 0..120 {
            world.step(1.0 / 60.0);
            grounded |= world
                .drain_contacts()
                .iter()
                .any(|c| c.kind == ContactKind::Track);
        }
        assert!(grounded);
        let y = world.ball_position().y;
        assert!((y - 0.65).abs() < 0.1, "ball should rest on the floor, y={y}");
    }

    #[test]
    fn test_fast_ball_does_not_tunnel_thin_wall() {
        let mut world = world();
        floor(&mut world);
        let wall_material = world.default_material();
        world.add_static_box(
            Vec3::new(0.0, 1.0, -10.0),
            Vec3::new(5.0, 1.0, 0.3),
            0.0,
            groups::OBSTACLE,
            wall_material,
        );
        world.create_ball(Vec3::new(0.0, 0.65, 0.0), 0.65, 5.0, 0.2, 0.3);

        let mut hit = 0;
        for _ in 0..60 {
            world.set_ball_velocity(Vec3::new(0.0, 0.0, -40.0));
            world.step(1.0 / 60.0);
            hit += world
                .drain_contacts()
                .iter()
                .filter(|c| c.kind == ContactKind::Obstacle)
                .count();
        }
        assert!(world.ball_position().z > -10.0);
        // Reported once on contact start, not every substep
        assert_eq!(hit, 1);
    }

    #[test]
    fn test_ghost_filter_passes_through_obstacles() {
        let mut world = world();
        floor(&mut world);
        let wall_material = world.default_material();
        world.add_static_box(
            Vec3::new(0.0, 1.0, -5.0),
            Vec3::new(5.0, 1.0, 0.3),
            0.0,
            groups::OBSTACLE,
            wall_material,
        );
        world.create_ball(Vec3::new(0.0, 0.65, 0.0), 0.65, 5.0, 0.2, 0.3);
        world.set_ball_filter(groups::ghost_filter());

        for _ in 0..60 {
            world.set_ball_velocity(Vec3::new(0.0, 0.0, -20.0));
            world.step(1.0 / 60.0);
            assert!(
                world
                    .drain_contacts()
                    .iter()
                    .all(|c| c.kind != ContactKind::Obstacle)
            );
        }
        assert!(world.ball_position().z < -10.0);
        assert_eq!(world.ball_filter(), Some(groups::ghost_filter()));
    }

    #[test]
    fn test_kinematic_x_and_removal() {
        let mut world = world();
        let material = world.default_material();
        let body = world.add_kinematic_box(
            Vec3::new(0.0, 1.0, -3.0),
            Vec3::splat(0.7),
            groups::OBSTACLE,
            material,
        );
        world.set_kinematic_x(body, 2.5);
        assert_eq!(world.body_translation(body), Some(Vec3::new(2.5, 1.0, -3.0)));

        assert_eq!(world.body_count(), 1);
        world.remove_body(body);
        assert_eq!(world.body_count(), 0);
        assert!(!world.contains(body));
    }

    #[test]
    fn test_contact_kind_classification() {
        assert_eq!(ContactKind::from_group(groups::TRACK), ContactKind::Track);
        assert_eq!(ContactKind::from_group(groups::RAIL), ContactKind::Rail);
        assert_eq!(ContactKind::from_group(groups::OBSTACLE), ContactKind::Obstacle);
        assert_eq!(ContactKind::from_group(groups::COLLECTIBLE), ContactKind::Other);
        assert!(ContactKind::Rail.is_ground());
        assert!(!ContactKind::Obstacle.is_ground());
    }
}
