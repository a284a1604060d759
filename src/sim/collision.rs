//! Proximity tests and post-step corrections
//!
//! Collectibles never touch the physics world: pickups are resolved here with
//! plain geometry against the ball pose the physics step produced.

use glam::Vec3;

use super::physics::{ContactEvent, ContactKind};

/// Ball centre within `capture_radius` of an item centre
#[inline]
pub fn sphere_overlap(ball: Vec3, item: Vec3, capture_radius: f32) -> bool {
    ball.distance_squared(item) < capture_radius * capture_radius
}

/// Ring-gate test for a hoop facing the track axis (Z).
///
/// The ball must be within `z_tolerance` of the ring plane AND inside the
/// inner radius in the XY plane: passing through, not touching.
#[inline]
pub fn passes_through_ring(ball: Vec3, ring_center: Vec3, inner_radius: f32, z_tolerance: f32) -> bool {
    let dz = (ball.z - ring_center.z).abs();
    if dz >= z_tolerance {
        return false;
    }
    let dx = ball.x - ring_center.x;
    let dy = ball.y - ring_center.y;
    dx * dx + dy * dy < inner_radius * inner_radius
}

/// Result of clamping the ball between the rails
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailClamp {
    pub x: f32,
    pub vx: f32,
    pub clamped: bool,
}

/// Keep the ball centre inside `±bound`, zeroing only outward velocity.
pub fn clamp_to_rails(x: f32, vx: f32, bound: f32) -> RailClamp {
    if x > bound {
        RailClamp {
            x: bound,
            vx: vx.min(0.0),
            clamped: true,
        }
    } else if x < -bound {
        RailClamp {
            x: -bound,
            vx: vx.max(0.0),
            clamped: true,
        }
    } else {
        RailClamp {
            x,
            vx,
            clamped: false,
        }
    }
}

/// Ball has dropped too far below the local floor
#[inline]
pub fn is_fallen(ball_y: f32, floor_y: f32, threshold: f32) -> bool {
    ball_y < floor_y - threshold
}

/// Damp upward bounce while rolling on a flat surface.
///
/// Strong upward velocity is killed, mild upward velocity halved.
#[inline]
pub fn settle_vertical(vy: f32) -> f32 {
    if vy > 0.3 {
        0.0
    } else if vy > 0.0 {
        vy * 0.5
    } else {
        vy
    }
}

/// What the ball touched during a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactSummary {
    /// Touched track or rail at least once
    pub ground: bool,
    /// Number of new obstacle contacts
    pub obstacle_hits: u32,
}

pub fn classify_contacts(events: &[ContactEvent]) -> ContactSummary {
    events.iter().fold(ContactSummary::default(), |mut acc, e| {
        if e.kind.is_ground() {
            acc.ground = true;
        }
        if e.kind == ContactKind::Obstacle {
            acc.obstacle_hits += 1;
        }
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_outward_velocity_zeroed() {
        let c = clamp_to_rails(3.4, 2.0, 3.35);
        assert_eq!(c.x, 3.35);
        assert_eq!(c.vx, 0.0);
        assert!(c.clamped);
    }

    #[test]
    fn test_clamp_inward_velocity_kept() {
        let c = clamp_to_rails(3.4, -1.5, 3.35);
        assert_eq!(c.x, 3.35);
        assert_eq!(c.vx, -1.5);

        let c = clamp_to_rails(-3.4, 1.5, 3.35);
        assert_eq!(c.x, -3.35);
        assert_eq!(c.vx, 1.5);
    }

    #[test]
    fn test_clamp_inside_untouched() {
        let c = clamp_to_rails(1.0, 5.0, 3.35);
        assert_eq!(c, RailClamp { x: 1.0, vx: 5.0, clamped: false });
    }

    #[test]
    fn test_ring_gate() {
        let hoop = Vec3::new(0.0, 2.0, 100.0);
        let tol = 0.65 + 0.3;
        assert!(passes_through_ring(Vec3::new(0.0, 2.0, 100.0), hoop, 1.5, tol));
        // Same Z, outside the inner radius
        assert!(!passes_through_ring(Vec3::new(2.0, 2.0, 100.0), hoop, 1.5, tol));
        // Inside the radius but too far along the track
        assert!(!passes_through_ring(Vec3::new(0.0, 2.0, 101.0), hoop, 1.5, tol));
    }

    #[test]
    fn test_sphere_overlap() {
        assert!(sphere_overlap(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 1.05));
        assert!(!sphere_overlap(Vec3::ZERO, Vec3::new(1.1, 0.0, 0.0), 1.05));
    }

    #[test]
    fn test_settle_vertical() {
        assert_eq!(settle_vertical(5.0), 0.0);
        assert_eq!(settle_vertical(0.2), 0.1);
        assert_eq!(settle_vertical(-3.0), -3.0);
    }

    #[test]
    fn test_fall_threshold() {
        assert!(!is_fallen(-9.0, 10.0, 20.0));
        assert!(is_fallen(-10.5, 10.0, 20.0));
    }

    #[test]
    fn test_classify_contacts() {
        let events = [
            ContactEvent { kind: ContactKind::Track, other: None },
            ContactEvent { kind: ContactKind::Obstacle, other: None },
            ContactEvent { kind: ContactKind::Obstacle, other: None },
        ];
        let s = classify_contacts(&events);
        assert!(s.ground);
        assert_eq!(s.obstacle_hits, 2);
        assert_eq!(classify_contacts(&[]), ContactSummary::default());
    }
}
