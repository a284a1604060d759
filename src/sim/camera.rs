//! Chase camera and pointer unprojection
//!
//! The rig trails the ball with frame-rate independent exponential smoothing
//! (fast in XZ, slow in Y to absorb slope steps) and converts a pointer in
//! normalized device coordinates to a world X on the ball's height plane.

use glam::{Mat4, Vec2, Vec3};
use serde::Serialize;

use crate::smooth_factor;

const OFFSET: Vec3 = Vec3::new(0.0, 5.0, 8.0);
const LOOK_AHEAD_Z: f32 = -12.0;
const LOOK_HEIGHT: f32 = 0.5;
const XZ_RATE: f32 = 3.5;
const Y_RATE: f32 = 1.2;
const X_FOLLOW: f32 = 0.4;
const LOOK_X_FOLLOW: f32 = 0.3;

/// Camera pose and projection
#[derive(Debug, Clone, Serialize)]
pub struct CameraRig {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            position: OFFSET,
            target: Vec3::new(0.0, LOOK_HEIGHT, LOOK_AHEAD_Z),
            fov_y_degrees: 65.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 200.0,
        }
    }
}

impl CameraRig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Jump straight to the resting pose behind the ball (run start)
    pub fn snap(&mut self, ball: Vec3) {
        self.position = Vec3::new(0.0, ball.y + OFFSET.y, ball.z + OFFSET.z);
        self.target = Vec3::new(0.0, ball.y + LOOK_HEIGHT, ball.z + LOOK_AHEAD_Z);
    }

    pub fn follow(&mut self, ball: Vec3, dt: f32) {
        let desired = Vec3::new(ball.x * X_FOLLOW, ball.y + OFFSET.y, ball.z + OFFSET.z);
        let k = smooth_factor(XZ_RATE, dt);
        let ky = smooth_factor(Y_RATE, dt);

        self.position.x += (desired.x - self.position.x) * k;
        self.position.y += (desired.y - self.position.y) * ky;
        self.position.z += (desired.z - self.position.z) * k;

        self.target = Vec3::new(ball.x * LOOK_X_FOLLOW, ball.y + LOOK_HEIGHT, ball.z + LOOK_AHEAD_Z);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    /// World X where the pointer ray crosses the ball's height.
    ///
    /// Falls back to the ball's own X when the ray is degenerate, nearly
    /// parallel to the plane, or points away from it.
    pub fn unproject_to_ball_plane(&self, ndc: Vec2, ball: Vec3) -> f32 {
        let inverse = (self.projection() * self.view()).inverse();
        if !inverse.is_finite() {
            log::warn!("camera matrix not invertible, keeping ball X");
            return ball.x;
        }

        let point = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 0.5));
        let Some(dir) = (point - self.position).try_normalize() else {
            return ball.x;
        };
        if dir.y.abs() < 1e-3 {
            return ball.x;
        }

        let t = (ball.y - self.position.y) / dir.y;
        let x = self.position.x + dir.x * t;
        if t < 0.0 || !x.is_finite() {
            return ball.x;
        }
        x
    }
}
