//! Normalized per-frame control state
//!
//! Touch/mouse/keyboard capture happens elsewhere; the core only sees this.

/// Input commands for a single frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    /// Desired lateral world X (pointer/touch drag), if the pointer is down
    pub steer_to_world_x: Option<f32>,
    /// Discrete key state
    pub move_left: bool,
    pub move_right: bool,
    /// Edge-triggered: set once per press, consumed by the next tick
    pub jump_requested: bool,
}

impl FrameInput {
    /// Clear one-shot inputs after a tick has consumed them
    pub fn clear_one_shots(&mut self) {
        self.jump_requested = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_one_shots_keeps_held_state() {
        let mut input = FrameInput {
            steer_to_world_x: Some(1.0),
            move_left: true,
            move_right: false,
            jump_requested: true,
        };
        input.clear_one_shots();
        assert!(!input.jump_requested);
        assert!(input.move_left);
        assert_eq!(input.steer_to_world_x, Some(1.0));
    }
}
