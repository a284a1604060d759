//! HUD collaborator interface

/// On-screen readouts. Every method defaults to a no-op so a HUD only needs
/// to implement what it displays.
pub trait Hud {
    fn set_score(&mut self, _score: u64) {}
    fn set_best_score(&mut self, _best: u64) {}
    fn set_lives(&mut self, _lives: u8) {}
    fn set_level_banner(&mut self, _level: u32) {}
    /// `Some((remaining, total))` while ghost mode runs, `None` to hide
    fn set_ghost_indicator(&mut self, _ghost: Option<(f32, f32)>) {}
    fn show_game_over(&mut self, _score: u64, _best: u64) {}
}

/// HUD that shows nothing
#[derive(Debug, Default)]
pub struct NullHud;

impl Hud for NullHud {}

/// HUD that writes milestones to the log (headless runs)
#[derive(Debug, Default)]
pub struct LogHud {
    ghost_visible: bool,
}

impl Hud for LogHud {
    fn set_score(&mut self, score: u64) {
        log::debug!("score {}", score);
    }

    fn set_lives(&mut self, lives: u8) {
        log::info!("lives {}", lives);
    }

    fn set_level_banner(&mut self, level: u32) {
        log::info!("LEVEL {}", level);
    }

    fn set_ghost_indicator(&mut self, ghost: Option<(f32, f32)>) {
        let visible = ghost.is_some();
        if visible != self.ghost_visible {
            log::debug!("ghost indicator {}", if visible { "on" } else { "off" });
            self.ghost_visible = visible;
        }
    }

    fn show_game_over(&mut self, score: u64, best: u64) {
        log::info!("GAME OVER - score {} (best {})", score, best);
    }
}
