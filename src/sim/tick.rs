//! Run orchestration
//!
//! `Game` owns every piece of the simulation and advances it one rendered
//! frame at a time. Per-frame order:
//! 1. Speed modifiers and forward velocity
//! 2. Steering and jump input
//! 3. Physics step, then contact handling (damage, ground re-arm)
//! 4. Rail clamp and vertical settle
//! 5. Ball visual and camera
//! 6. Fall check and respawn
//! 7. Generation ahead, trailing cleanup
//! 8. Obstacle animation, pickups, scoring
//! 9. HUD and audio

use glam::{Vec2, Vec3};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::camera::CameraRig;
use super::collectibles::{CollectibleKind, CollectibleSpawner};
use super::collision::{clamp_to_rails, classify_contacts, is_fallen, settle_vertical};
use super::difficulty::{DifficultyController, difficulty_for_score};
use super::obstacles::ObstacleSpawner;
use super::physics::PhysicsWorld;
use super::player::Ball;
use super::state::{
    CollectibleView, DamageCause, GameEvent, GamePhase, ObstacleView, RunState, Snapshot,
};
use super::track::{SegmentInfo, TrackGenerator};
use crate::audio::{AudioSink, Cue};
use crate::consts::*;
use crate::persistence::ScoreStore;
use crate::platform::{FrameInput, Geometry, Hud, MaterialKey, Placement, Scene, SharedGeometry, VisualRef};
use crate::tuning::{Tuning, by_level};

const RAIL_TINT: u32 = 0x00ffcc;
/// Timestep used to let the ball settle before a run
const SETTLE_DT: f32 = 1.0 / 60.0;

/// The whole game: world, generators, ball and collaborators
pub struct Game<S: Scene> {
    tuning: Tuning,
    phase: GamePhase,
    seed: u64,
    rng: Pcg32,
    world: PhysicsWorld,
    track: TrackGenerator,
    obstacles: ObstacleSpawner,
    collectibles: CollectibleSpawner,
    difficulty: DifficultyController,
    ball: Ball,
    camera: CameraRig,
    run: RunState,
    forward_speed: f32,
    rails: [VisualRef; 2],
    events: Vec<GameEvent>,
    scene: S,
    hud: Box<dyn Hud>,
    audio: Box<dyn AudioSink>,
    store: Box<dyn ScoreStore>,
}

impl<S: Scene> Game<S> {
    pub fn new(
        tuning: Tuning,
        mut scene: S,
        mut hud: Box<dyn Hud>,
        audio: Box<dyn AudioSink>,
        store: Box<dyn ScoreStore>,
    ) -> Self {
        let tuning = tuning.sanitized();
        let mut world = PhysicsWorld::new(&tuning.physics);
        let ball = Ball::spawn(
            Vec3::new(0.0, tuning.track.start_y + 2.0, 0.0),
            tuning.player.clone(),
            &mut world,
            &mut scene,
        );
        let rails = [-1.0, 1.0].map(|side| {
            VisualRef::spawn(
                &mut scene,
                Geometry::Shared(SharedGeometry::RailTube),
                MaterialKey::Neon(RAIL_TINT),
                Placement::at(Vec3::new(side * TRACK_HALF_WIDTH, 0.0, 0.0)).hidden(),
            )
        });

        let best = store.load_best_score().unwrap_or_else(|e| {
            log::warn!("Could not load best score: {e}");
            0
        });
        hud.set_best_score(best);

        Self {
            track: TrackGenerator::new(tuning.track.clone()),
            obstacles: ObstacleSpawner::new(tuning.obstacles.clone()),
            collectibles: CollectibleSpawner::new(tuning.collectibles.clone()),
            run: RunState::new(best, tuning.run.lives),
            tuning,
            phase: GamePhase::Menu,
            seed: 0,
            rng: Pcg32::seed_from_u64(0),
            world,
            difficulty: DifficultyController::new(),
            ball,
            camera: CameraRig::new(),
            forward_speed: 0.0,
            rails,
            events: Vec::new(),
            scene,
            hud,
            audio,
            store,
        }
    }

    // --- Accessors ---

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn run(&self) -> &RunState {
        &self.run
    }

    pub fn track(&self) -> &TrackGenerator {
        &self.track
    }

    pub fn obstacles(&self) -> &ObstacleSpawner {
        &self.obstacles
    }

    pub fn collectibles(&self) -> &CollectibleSpawner {
        &self.collectibles
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    /// Viewport changed size; keeps pointer steering aligned with the view
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.camera.set_aspect(width as f32 / height as f32);
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn forward_speed(&self) -> f32 {
        self.forward_speed
    }

    pub fn ball_position(&self) -> Vec3 {
        self.world.ball_position()
    }

    /// Pointer in normalized device coordinates to a steering target X
    pub fn pointer_to_world_x(&self, ndc: Vec2) -> f32 {
        self.camera
            .unproject_to_ball_plane(ndc, self.world.ball_position())
    }

    // --- Run lifecycle ---

    /// Release all live content and reset run state. Safe to call repeatedly.
    pub fn reset_run(&mut self) {
        self.track.reset(&mut self.world, &mut self.scene);
        self.obstacles.reset(&mut self.world, &mut self.scene);
        self.collectibles.reset(&mut self.scene);
        self.difficulty.reset();
        self.ball.end_ghost(&mut self.world, &mut self.scene);
        self.world.clear_transients();
        self.run = RunState::new(self.run.best_score, self.tuning.run.lives);
        self.forward_speed = 0.0;
        self.events.clear();
        for rail in &self.rails {
            self.scene
                .place_visual(rail.handle, Placement::at(Vec3::ZERO).hidden());
        }
    }

    /// Begin a new run from `seed`
    pub fn start_run(&mut self, seed: u64) {
        self.reset_run();
        self.seed = seed;
        self.rng = Pcg32::seed_from_u64(seed);

        let run_tuning = self.tuning.run.clone();
        for i in 0..run_tuning.segments_ahead {
            let level = difficulty_for_score(self.run.score).level;
            let seg = self
                .track
                .generate_segment(level, &mut self.rng, &mut self.world, &mut self.scene);
            self.populate(
                seg,
                level,
                i > run_tuning.obstacle_start_index,
                i > run_tuning.collectible_start_index,
            );
        }

        // Slightly sunk so contact is found on the first step
        let (start_y, start_z) = self
            .track
            .first()
            .map(|s| (s.end_y, s.z_pos))
            .unwrap_or((self.tuning.track.start_y, 0.0));
        let spawn = Vec3::new(0.0, start_y + self.ball.radius - 0.05, start_z);
        self.ball.place(spawn, &mut self.world, &mut self.scene);

        for _ in 0..run_tuning.settle_steps {
            self.world.step_fixed(SETTLE_DT);
        }
        let settled = self.world.ball_position();
        self.ball.place(settled, &mut self.world, &mut self.scene);
        self.world.clear_transients();

        self.camera.snap(settled);
        self.update_rails();

        self.hud.set_score(0);
        self.hud.set_best_score(self.run.best_score);
        self.hud.set_lives(self.run.lives);
        self.hud.set_ghost_indicator(None);
        self.hud.set_level_banner(1);

        self.phase = GamePhase::Playing;
        log::info!(
            "Run started (seed {}, {} segments, {} obstacles, {} collectibles)",
            seed,
            self.track.len(),
            self.obstacles.len(),
            self.collectibles.len()
        );
    }

    /// Spawn a segment's content, obstacle first so items can avoid it
    fn populate(&mut self, seg: SegmentInfo, level: u32, with_obstacle: bool, with_items: bool) {
        let floor_y = seg.floor_y();
        let obstacle = if with_obstacle && seg.is_traversable() {
            self.obstacles.spawn(
                seg.z_pos,
                seg.width,
                level,
                floor_y,
                &mut self.rng,
                &mut self.world,
                &mut self.scene,
            )
        } else {
            None
        };
        if with_items {
            self.collectibles.spawn_for_segment(
                seg.z_pos,
                seg.width,
                level,
                floor_y,
                obstacle,
                &mut self.rng,
                &mut self.scene,
            );
        }
    }

    // --- Frame ---

    /// Advance one rendered frame. Returns what happened.
    pub fn tick(&mut self, input: &FrameInput, dt: f32) -> &[GameEvent] {
        self.events.clear();
        if !(dt.is_finite() && dt > 0.0) {
            return &self.events;
        }
        let dt = dt.min(MAX_FRAME_DT);
        self.audio.advance(dt);

        if self.phase != GamePhase::Playing {
            return &self.events;
        }

        self.run.elapsed += dt;
        self.run.modifiers.advance(dt);

        // Forward speed
        let run = &self.tuning.run;
        let level_mult = difficulty_for_score(self.run.score).speed_multiplier;
        self.forward_speed = -run.base_forward_speed
            * level_mult
            * self
                .run
                .modifiers
                .multiplier(run.boost_multiplier, run.hit_slow_min);
        let mut vel = self.world.ball_velocity();
        vel.z = self.forward_speed;
        self.world.set_ball_velocity(vel);

        // Input
        self.ball.steer(input, dt, &mut self.world);
        if self.ball.try_jump(input.jump_requested, &mut self.world) {
            self.events.push(GameEvent::Jumped);
        }
        self.ball.tick_ground_timer(dt);

        // Physics
        self.world.step(dt);
        let contacts = classify_contacts(&self.world.drain_contacts());
        if contacts.ground {
            self.ball.note_ground_contact(self.world.ball_velocity().y);
        }
        if contacts.obstacle_hits > 0 && !self.ball.is_ghost() && self.take_damage(DamageCause::Obstacle) {
            return &self.events;
        }

        // Post-step corrections
        let mut pos = self.world.ball_position();
        let mut vel = self.world.ball_velocity();
        let clamp = clamp_to_rails(pos.x, vel.x, TRACK_MAX_X);
        if clamp.clamped {
            pos.x = clamp.x;
            vel.x = clamp.vx;
            self.world.set_ball_position(pos);
        }
        if self.track.is_level_at(pos.z) && !self.ball.is_airborne() {
            vel.y = settle_vertical(vel.y);
        }
        self.world.set_ball_velocity(vel);

        // Visuals
        if self.ball.update(dt, &mut self.world, &mut self.scene) {
            self.events.push(GameEvent::GhostEnded);
        }
        self.camera.follow(self.world.ball_position(), dt);

        // Fell off the track
        let pos = self.world.ball_position();
        let floor = self.track.floor_at(pos.z);
        if is_fallen(pos.y, floor, self.tuning.player.fall_threshold) {
            let (z, floor) = self
                .track
                .landing_at(pos.z - self.tuning.player.respawn_ahead);
            self.ball.respawn(z, floor, &mut self.world, &mut self.scene);
            self.events.push(GameEvent::Respawned {
                z: self.world.ball_position().z,
            });
            if self.take_damage(DamageCause::Fall) {
                return &self.events;
            }
        }

        // Stream content
        let ball_z = self.world.ball_position().z;
        let lookahead = self.tuning.run.segments_ahead as f32 * SEGMENT_LENGTH;
        while ball_z - self.track.last_segment_z() < lookahead {
            let level = difficulty_for_score(self.run.score).level;
            let seg = self
                .track
                .generate_segment(level, &mut self.rng, &mut self.world, &mut self.scene);
            self.populate(seg, level, true, true);
        }
        self.track
            .remove_old(ball_z, &mut self.world, &mut self.scene);
        self.obstacles
            .remove_old(ball_z, &mut self.world, &mut self.scene);
        self.collectibles.remove_old(ball_z, &mut self.scene);
        self.update_rails();

        // Animation and pickups
        let time = self.run.elapsed;
        self.obstacles
            .update(time, &mut self.world, &mut self.scene);
        let result = self.collectibles.update(
            time,
            self.world.ball_position(),
            self.ball.radius,
            !self.ball.is_ghost(),
            &mut self.scene,
        );
        for kind in &result.collected {
            self.events.push(GameEvent::Collected {
                kind: *kind,
                points: kind.points(),
            });
        }
        if result.boost {
            self.run.modifiers.start_boost(self.tuning.run.boost_duration);
            self.audio.play(Cue::CollectBoost);
            self.events.push(GameEvent::BoostStarted);
        }
        if result.points > 0 {
            self.add_score(result.points, &result.collected);
        }

        // HUD
        let ghost = self
            .ball
            .is_ghost()
            .then(|| (self.ball.ghost_remaining(), self.ball.ghost_duration()));
        self.hud.set_ghost_indicator(ghost);

        &self.events
    }

    fn add_score(&mut self, points: u64, collected: &[CollectibleKind]) {
        self.run.score += points;
        self.hud.set_score(self.run.score);

        let cue = if collected
            .iter()
            .any(|k| matches!(k, CollectibleKind::Hoop { .. }))
        {
            Cue::CollectRarest
        } else if collected.contains(&CollectibleKind::Diamond) {
            Cue::CollectRare
        } else {
            Cue::CollectCommon
        };
        self.audio.play(cue);

        if let Some(d) = self.difficulty.check_level_up(self.run.score) {
            self.run.level = d.level;
            self.hud.set_level_banner(d.level);
            self.audio.play(Cue::LevelUp);
            self.events.push(GameEvent::LevelUp {
                level: d.level,
                name: d.name,
            });
        }

        if self.run.score > self.run.best_score {
            self.run.best_score = self.run.score;
            self.hud.set_best_score(self.run.best_score);
            if !self.run.record_saved {
                self.run.record_saved = true;
                self.persist_best();
                self.events.push(GameEvent::NewBest {
                    score: self.run.score,
                });
            }
        }
    }

    /// Lose a life unless ghosted. Returns true if the run ended.
    fn take_damage(&mut self, cause: DamageCause) -> bool {
        if self.ball.is_ghost() {
            return false;
        }
        self.run.lives = self.run.lives.saturating_sub(1);
        self.hud.set_lives(self.run.lives);
        self.audio.play(Cue::Hit);
        self.events.push(GameEvent::Damaged {
            lives_left: self.run.lives,
            cause,
        });

        if self.run.lives == 0 {
            self.game_over();
            return true;
        }

        if self.ball.enter_ghost(&mut self.world, &mut self.scene) {
            self.events.push(GameEvent::GhostStarted);
        }
        let slow = by_level(
            &self.tuning.run.hit_slow_durations,
            self.difficulty.current_level(),
            self.tuning.run.default_hit_slow,
        );
        self.run.modifiers.start_hit_slow(slow);
        false
    }

    fn game_over(&mut self) {
        self.phase = GamePhase::GameOver;
        self.audio.play(Cue::GameOver);
        self.world.set_ball_force(Vec3::ZERO);

        if self.run.score > self.run.best_at_start {
            self.run.best_score = self.run.best_score.max(self.run.score);
            self.persist_best();
        }

        self.hud.set_ghost_indicator(None);
        self.hud.show_game_over(self.run.score, self.run.best_score);
        self.events.push(GameEvent::GameOver {
            score: self.run.score,
            best: self.run.best_score,
        });
        log::info!(
            "Game over: score {} (best {}), level {}, {:.1}s",
            self.run.score,
            self.run.best_score,
            self.run.level,
            self.run.elapsed
        );
    }

    fn persist_best(&mut self) {
        if let Err(e) = self.store.save_best_score(self.run.best_score) {
            log::warn!("Could not save best score: {e}");
        }
    }

    fn update_rails(&mut self) {
        let span = self.track.rail_span();
        for (rail, side) in self.rails.iter().zip([-1.0, 1.0]) {
            let placement = match span {
                Some(span) => Placement::at(Vec3::new(side * span.half_width, span.y, span.center_z))
                    .with_scale(Vec3::new(1.0, 1.0, span.length)),
                None => Placement::at(Vec3::ZERO).hidden(),
            };
            self.scene.place_visual(rail.handle, placement);
        }
    }

    /// Everything a renderer or HUD needs for this frame
    pub fn snapshot(&self) -> Snapshot {
        let time = self.run.elapsed;
        Snapshot {
            phase: self.phase,
            ball_position: self.world.ball_position(),
            ball_velocity: self.world.ball_velocity(),
            mode: self.ball.mode(),
            score: self.run.score,
            best_score: self.run.best_score,
            level: self.difficulty.current_level(),
            lives: self.run.lives,
            elapsed: time,
            forward_speed: self.forward_speed,
            obstacles: self
                .obstacles
                .obstacles()
                .iter()
                .filter(|o| o.active)
                .map(|o| ObstacleView {
                    id: o.id,
                    kind: o.kind.name(),
                    x: o.x(),
                    y: o.floor_y,
                    z: o.z_pos,
                })
                .collect(),
            collectibles: self
                .collectibles
                .items()
                .iter()
                .map(|c| CollectibleView {
                    id: c.id,
                    kind: c.kind,
                    position: c.position(time),
                    collected: c.collected,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::audio::NullAudio;
    use crate::persistence::MemoryStore;
    use crate::platform::{HeadlessScene, NullHud};
    use crate::sim::track::SegmentKind;

    const DT: f32 = 1.0 / 60.0;
    /// Ball visual plus the two continuous rail visuals
    const FIXED_VISUALS: usize = 3;

    fn game() -> Game<HeadlessScene> {
        Game::new(
            Tuning::default(),
            HeadlessScene::new(),
            Box::new(NullHud),
            Box::new(NullAudio),
            Box::new(MemoryStore::default()),
        )
    }

    #[derive(Debug, Default)]
    struct Record {
        lives: Vec<u8>,
        best: Vec<u64>,
        banners: Vec<u32>,
        game_overs: Vec<(u64, u64)>,
        cues: Vec<Cue>,
        saves: Vec<u64>,
    }

    type Shared = Rc<RefCell<Record>>;

    struct RecordingHud(Shared);

    impl Hud for RecordingHud {
        fn set_best_score(&mut self, best: u64) {
            self.0.borrow_mut().best.push(best);
        }

        fn set_lives(&mut self, lives: u8) {
            self.0.borrow_mut().lives.push(lives);
        }

        fn set_level_banner(&mut self, level: u32) {
            self.0.borrow_mut().banners.push(level);
        }

        fn show_game_over(&mut self, score: u64, best: u64) {
            self.0.borrow_mut().game_overs.push((score, best));
        }
    }

    struct RecordingAudio(Shared);

    impl AudioSink for RecordingAudio {
        fn play(&mut self, cue: Cue) {
            self.0.borrow_mut().cues.push(cue);
        }
    }

    struct RecordingStore {
        best: u64,
        record: Shared,
    }

    impl ScoreStore for RecordingStore {
        fn load_best_score(&self) -> crate::Result<u64> {
            Ok(self.best)
        }

        fn save_best_score(&mut self, score: u64) -> crate::Result<()> {
            self.best = score;
            self.record.borrow_mut().saves.push(score);
            Ok(())
        }
    }

    fn recorded_game(tuning: Tuning, best: u64) -> (Game<HeadlessScene>, Shared) {
        let record = Shared::default();
        let game = Game::new(
            tuning,
            HeadlessScene::new(),
            Box::new(RecordingHud(record.clone())),
            Box::new(RecordingAudio(record.clone())),
            Box::new(RecordingStore {
                best,
                record: record.clone(),
            }),
        );
        (game, record)
    }

    /// Tuning where the ball counts as fallen every frame and ghost mode is brief
    fn doomed() -> Tuning {
        let mut tuning = Tuning::default();
        tuning.player.fall_threshold = -1000.0;
        tuning.player.ghost_duration = 0.05;
        tuning
    }

    /// Flat track with no obstacles
    fn calm() -> Tuning {
        let mut tuning = Tuning::default();
        tuning.track.descent_ramp_chance = 0.0;
        tuning.track.ramp_chance_by_level = vec![0.0];
        tuning.track.max_ramp_chance = 0.0;
        tuning.obstacles.frequency_by_level = vec![0.0];
        tuning.obstacles.default_frequency = 0.0;
        tuning
    }

    /// Two flats, then ramp and gap alternating, no obstacles
    fn ramps() -> Tuning {
        let mut tuning = calm();
        tuning.track.safe_start_segments = 2;
        tuning.track.descent_ramp_chance = 1.0;
        tuning.track.max_ramp_chance = 1.0;
        tuning
    }

    /// Every item-bearing segment gets a dot cluster and nothing else
    fn dots_only(mut tuning: Tuning) -> Tuning {
        tuning.collectibles.density_by_level = vec![1.0];
        tuning.collectibles.diamond_scale = 0.0;
        tuning.collectibles.hoop_scale = 0.0;
        tuning.collectibles.boost_scale = 0.0;
        tuning
    }

    /// Put the ball at rest on the floor at `(x, z)`
    fn drop_ball_at(g: &mut Game<HeadlessScene>, x: f32, z: f32) {
        let y = g.track.floor_at(z) + BALL_RADIUS;
        g.ball.place(Vec3::new(x, y, z), &mut g.world, &mut g.scene);
    }

    /// Every live body and visual is owned by exactly one thing
    fn assert_no_leaks(game: &Game<HeadlessScene>) {
        let bodies = game.track().body_count() + game.obstacles().body_count() + 1;
        assert_eq!(game.world().body_count(), bodies, "physics body leak");

        let visuals = game.track().visual_count()
            + game.obstacles().visual_count()
            + game.collectibles().len()
            + FIXED_VISUALS;
        assert_eq!(game.scene().live_count(), visuals, "visual leak");
        assert_eq!(game.scene().shared_disposals(), 0, "pooled geometry disposed");
    }

    fn weave(frame: u32) -> FrameInput {
        FrameInput {
            steer_to_world_x: Some(((frame as f32) * 0.05).sin() * 2.5),
            jump_requested: frame % 90 == 45,
            ..FrameInput::default()
        }
    }

    #[test]
    fn test_new_game_waits_in_menu() {
        let mut g = game();
        assert_eq!(g.phase(), GamePhase::Menu);
        assert!(g.tick(&FrameInput::default(), DT).is_empty());
        assert!(g.track().is_empty());
    }

    #[test]
    fn test_start_run_fills_lookahead() {
        let mut g = game();
        g.start_run(42);
        assert_eq!(g.phase(), GamePhase::Playing);
        assert_eq!(g.track().len(), 25);
        assert_eq!(g.run().lives, 3);
        // No obstacles in the opening stretch
        let sixth = -6.0 * SEGMENT_LENGTH;
        assert!(g.obstacles().obstacles().iter().all(|o| o.z_pos <= sixth));

        let first = *g.track().first().unwrap();
        let pos = g.ball_position();
        assert!((pos.y - (first.end_y + BALL_RADIUS)).abs() < 0.2, "ball should rest on the first segment");
        assert_eq!(g.world().ball_velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_ball_moves_forward() {
        let mut g = game();
        g.start_run(1);
        let z0 = g.ball_position().z;
        for _ in 0..30 {
            g.tick(&FrameInput::default(), DT);
        }
        assert!(g.ball_position().z < z0 - 5.0);
        assert!((g.forward_speed() + 22.0).abs() < 1e-3);
    }

    #[test]
    fn test_non_positive_dt_is_ignored() {
        let mut g = game();
        g.start_run(1);
        let before = g.snapshot();
        g.tick(&FrameInput::default(), 0.0);
        g.tick(&FrameInput::default(), f32::NAN);
        assert_eq!(g.snapshot(), before);
    }

    #[test]
    fn test_resize_tracks_viewport_aspect() {
        let mut g = game();
        g.resize(1920, 800);
        assert!((g.camera().aspect - 2.4).abs() < 1e-6);
        g.resize(0, 600);
        assert!((g.camera().aspect - 2.4).abs() < 1e-6);
    }

    #[test]
    fn test_damage_ghosts_then_ends_run() {
        let mut g = game();
        g.start_run(3);

        assert!(!g.take_damage(DamageCause::Obstacle));
        assert_eq!(g.run().lives, 2);
        assert!(g.ball().is_ghost());
        assert!(g.run().modifiers.is_slowed());

        // Ghosted: no further loss
        assert!(!g.take_damage(DamageCause::Obstacle));
        assert_eq!(g.run().lives, 2);

        g.ball.end_ghost(&mut g.world, &mut g.scene);
        assert!(!g.take_damage(DamageCause::Fall));
        g.ball.end_ghost(&mut g.world, &mut g.scene);
        assert!(g.take_damage(DamageCause::Obstacle));
        assert_eq!(g.phase(), GamePhase::GameOver);
        assert!(matches!(g.events.last(), Some(GameEvent::GameOver { .. })));
    }

    #[test]
    fn test_score_levels_and_record() {
        let mut g = game();
        g.start_run(5);
        g.add_score(100, &[CollectibleKind::Hoop { inner_radius: 1.5 }]);
        g.add_score(50, &[CollectibleKind::Diamond]);
        assert_eq!(g.run().score, 150);
        assert_eq!(g.run().level, 2);
        assert_eq!(g.run().best_score, 150);
        let level_ups = g
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::LevelUp { level: 2, .. }))
            .count();
        let records = g
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::NewBest { .. }))
            .count();
        assert_eq!(level_ups, 1);
        assert_eq!(records, 1);
    }

    #[test]
    fn test_wall_contact_costs_a_life_unless_ghosted() {
        let mut tuning = calm();
        tuning.obstacles.frequency_by_level = vec![1.0];
        tuning.obstacles.default_frequency = 1.0;
        tuning.obstacles.variant_thresholds = [1.0; 3];
        let (mut g, record) = recorded_game(tuning, 0);
        g.start_run(12);

        let walls: Vec<(f32, f32)> = g
            .obstacles()
            .obstacles()
            .iter()
            .map(|o| {
                assert_eq!(o.kind.name(), "static_wall");
                let (lo, hi) = o.blocking_extents(0.0, TRACK_WIDTH)[0];
                ((lo + hi) * 0.5, o.z_pos)
            })
            .collect();
        assert!(walls.len() >= 2);

        // Just touching the near face of the first wall
        let (x, z) = walls[0];
        drop_ball_at(&mut g, x, z + 0.9);
        let events = g.tick(&FrameInput::default(), DT).to_vec();
        assert!(events.contains(&GameEvent::Damaged {
            lives_left: 2,
            cause: DamageCause::Obstacle
        }));
        assert!(events.contains(&GameEvent::GhostStarted));
        assert_eq!(g.run().lives, 2);
        assert!(g.ball().is_ghost());
        assert!(g.run().modifiers.is_slowed());
        assert_eq!(record.borrow().lives, vec![3, 2]);
        assert_eq!(record.borrow().cues.iter().filter(|c| **c == Cue::Hit).count(), 1);

        // Same contact on the next wall while ghosted goes straight through
        let (x, z) = walls[1];
        let y = g.track().floor_at(z) + BALL_RADIUS;
        g.world.set_ball_position(Vec3::new(x, y, z + 0.9));
        let events = g.tick(&FrameInput::default(), DT).to_vec();
        assert!(!events.iter().any(|e| matches!(e, GameEvent::Damaged { .. })));
        assert_eq!(g.run().lives, 2);
        assert!(g.ball().is_ghost());
        assert_eq!(record.borrow().lives, vec![3, 2]);
    }

    #[test]
    fn test_pickup_scores_and_saves_record_once() {
        let (mut g, record) = recorded_game(dots_only(calm()), 0);
        g.start_run(21);
        let targets: Vec<(f32, f32)> = g
            .collectibles()
            .items()
            .iter()
            .take(2)
            .map(|c| (c.x, c.z_pos))
            .collect();
        assert_eq!(targets.len(), 2);

        let (x, z) = targets[0];
        drop_ball_at(&mut g, x, z + 0.2);
        let events = g.tick(&FrameInput::default(), DT).to_vec();
        assert!(events.contains(&GameEvent::Collected {
            kind: CollectibleKind::Dot,
            points: 10
        }));
        assert!(events.contains(&GameEvent::NewBest { score: 10 }));
        assert_eq!(g.run().score, 10);
        assert_eq!(g.run().best_score, 10);
        assert_eq!(record.borrow().saves, vec![10]);
        assert!(record.borrow().cues.contains(&Cue::CollectCommon));

        // Still beating the record, but it was already written this run
        let (x, z) = targets[1];
        drop_ball_at(&mut g, x, z + 0.2);
        let events = g.tick(&FrameInput::default(), DT).to_vec();
        assert!(events.iter().any(|e| matches!(e, GameEvent::Collected { .. })));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::NewBest { .. })));
        assert_eq!(g.run().score, 20);
        assert_eq!(g.run().best_score, 20);
        assert_eq!(record.borrow().saves, vec![10]);
    }

    #[test]
    fn test_boost_pickup_speeds_up_then_wears_off() {
        let mut tuning = calm();
        tuning.collectibles.density_by_level = vec![1.0];
        tuning.collectibles.diamond_scale = 0.0;
        tuning.collectibles.hoop_scale = 0.0;
        tuning.collectibles.boost_scale = 1.0;
        tuning.collectibles.boost_min_level = 1;
        let (mut g, record) = recorded_game(tuning, 0);
        g.start_run(33);

        let (x, z) = g
            .collectibles()
            .items()
            .iter()
            .find(|c| c.kind == CollectibleKind::Boost)
            .map(|c| (c.x, c.z_pos))
            .unwrap();
        drop_ball_at(&mut g, x, z + 0.2);
        let events = g.tick(&FrameInput::default(), DT).to_vec();
        assert!(events.contains(&GameEvent::BoostStarted));
        assert!(events.contains(&GameEvent::Collected {
            kind: CollectibleKind::Boost,
            points: 25
        }));
        assert!(record.borrow().cues.contains(&Cue::CollectBoost));

        let base = |g: &Game<HeadlessScene>| -22.0 * difficulty_for_score(g.run().score).speed_multiplier;
        let expected = base(&g) * 1.3;
        g.tick(&FrameInput::default(), DT);
        assert!(g.run().modifiers.is_boosting());
        assert!((g.forward_speed() - expected).abs() < 1e-3);

        for _ in 0..35 {
            g.tick(&FrameInput::default(), DT);
        }
        let expected = base(&g);
        g.tick(&FrameInput::default(), DT);
        assert!(!g.run().modifiers.is_boosting());
        assert!((g.forward_speed() - expected).abs() < 1e-3);
    }

    #[test]
    fn test_climbing_ramp_keeps_upward_speed() {
        let mut g = game_with(ramps());
        g.start_run(4);
        let ramp = *g.track().segments().nth(2).unwrap();
        assert_eq!(ramp.kind, SegmentKind::RampUp);
        let near_edge = ramp.z_pos + HALF_SEGMENT * RAMP_ANGLE.cos();

        drop_ball_at(&mut g, 0.0, near_edge + 2.5);
        let mut climbing = Vec::new();
        for _ in 0..40 {
            g.tick(&FrameInput::default(), DT);
            let pos = g.ball_position();
            let into_ramp = near_edge - pos.z;
            if (2.5..=6.0).contains(&into_ramp) {
                climbing.push(g.world().ball_velocity().y);
            }
            if into_ramp > 6.0 {
                break;
            }
        }
        assert!(!climbing.is_empty());
        assert!(climbing.iter().all(|vy| *vy > 0.3), "{climbing:?}");
    }

    #[test]
    fn test_fall_over_gap_respawns_on_track() {
        let mut tuning = ramps();
        tuning.player.fall_threshold = -1000.0;
        let mut g = game_with(tuning);
        g.start_run(6);
        let segs: Vec<SegmentInfo> = g.track().segments().copied().collect();
        let gap = segs[3];
        assert_eq!(gap.kind, SegmentKind::Gap);

        // Respawn point falls in the gap's slot
        let respawn_ahead = g.tuning.player.respawn_ahead;
        drop_ball_at(&mut g, 0.0, gap.z_pos + respawn_ahead);
        let respawned = g
            .tick(&FrameInput::default(), DT)
            .iter()
            .find_map(|e| match e {
                GameEvent::Respawned { z } => Some(*z),
                _ => None,
            })
            .unwrap();
        assert_eq!(respawned, segs[4].z_pos);
        assert!(g.track().segment_at(respawned).unwrap().is_traversable());
        let expected_y = g.track().floor_at(respawned) + BALL_RADIUS;
        assert!((g.ball_position().y - expected_y).abs() < 1e-4);
    }

    fn game_with(tuning: Tuning) -> Game<HeadlessScene> {
        recorded_game(tuning, 0).0
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (mut game, _) = recorded_game(Tuning::default(), 0);
        game.start_run(11);
        for frame in 0..120 {
            game.tick(&weave(frame), DT);
        }

        game.reset_run();
        let once = (
            game.track().len(),
            game.track().current_y(),
            game.track().total_generated(),
            game.obstacles().len(),
            game.collectibles().len(),
            game.world().body_count(),
            game.scene().live_count(),
            game.run().clone(),
        );
        game.reset_run();
        let twice = (
            game.track().len(),
            game.track().current_y(),
            game.track().total_generated(),
            game.obstacles().len(),
            game.collectibles().len(),
            game.world().body_count(),
            game.scene().live_count(),
            game.run().clone(),
        );

        assert_eq!(once, twice);
        assert!(game.track().is_empty());
        assert!(game.obstacles().is_empty());
        assert!(game.collectibles().is_empty());
        assert_eq!(game.track().total_generated(), 0);
        assert_eq!(game.world().body_count(), 1);
        assert_eq!(game.scene().live_count(), FIXED_VISUALS);
        assert_eq!(game.run().score, 0);
        assert_eq!(game.run().lives, 3);
    }

    #[test]
    fn test_streaming_keeps_windows_and_releases_everything() {
        let (mut game, _) = recorded_game(Tuning::default(), 0);
        game.start_run(2024);
        let segments_ahead = 25.0 * SEGMENT_LENGTH;

        for frame in 0..900 {
            game.tick(&weave(frame), DT);
            if game.phase() != GamePhase::Playing {
                break;
            }
            let z = game.ball_position().z;

            let track_limit = game.track().trailing_threshold(z);
            assert!(game.track().segments().all(|s| s.z_pos <= track_limit));
            let obstacle_limit = game.obstacles().trailing_threshold(z);
            assert!(game.obstacles().obstacles().iter().all(|o| o.z_pos <= obstacle_limit));
            let item_limit = game.collectibles().trailing_threshold(z);
            assert!(game.collectibles().items().iter().all(|c| c.z_pos <= item_limit));

            // Lookahead is always generated
            assert!(z - game.track().last_segment_z() >= segments_ahead);
            assert_no_leaks(&game);
        }

        assert!(game.track().total_generated() > 25, "track should have streamed");
    }

    #[test]
    fn test_ramps_are_followed_by_gaps_while_streaming() {
        let (mut game, _) = recorded_game(Tuning::default(), 0);
        game.start_run(99);
        let mut kinds = Vec::new();
        let mut last_id = None;
        for frame in 0..1200 {
            game.tick(&weave(frame), DT);
            for seg in game.track().segments() {
                if last_id.is_none_or(|id| seg.id > id) {
                    kinds.push(seg.kind);
                    last_id = Some(seg.id);
                }
            }
        }
        for pair in kinds.windows(2) {
            if pair[0] == SegmentKind::RampUp {
                assert_eq!(pair[1], SegmentKind::Gap);
            }
            if pair[1] == SegmentKind::Gap {
                assert_eq!(pair[0], SegmentKind::RampUp);
            }
        }
    }

    #[test]
    fn test_same_seed_same_run() {
        let play = |seed: u64| {
            let (mut game, _) = recorded_game(Tuning::default(), 0);
            game.start_run(seed);
            for frame in 0..300 {
                game.tick(&weave(frame), DT);
            }
            serde_json::to_string(&game.snapshot()).unwrap()
        };
        assert_eq!(play(7), play(7));
    }

    #[test]
    fn test_restart_generates_same_world() {
        let (mut game, _) = recorded_game(Tuning::default(), 0);
        game.start_run(5);
        let first: Vec<_> = game.track().segments().copied().collect();
        for frame in 0..200 {
            game.tick(&weave(frame), DT);
        }
        game.start_run(5);
        let second: Vec<_> = game.track().segments().copied().collect();
        assert_eq!(first, second);
        assert_no_leaks(&game);
    }

    #[test]
    fn test_losing_every_life_ends_the_run() {
        let (mut game, record) = recorded_game(doomed(), 500);
        game.start_run(3);

        let mut events = Vec::new();
        for _ in 0..120 {
            events.extend(game.tick(&FrameInput::default(), DT).iter().cloned());
            if game.phase() == GamePhase::GameOver {
                break;
            }
        }
        assert_eq!(game.phase(), GamePhase::GameOver);
        assert_eq!(game.run().lives, 0);

        let damage = events
            .iter()
            .filter(|e| matches!(e, GameEvent::Damaged { .. }))
            .count();
        assert_eq!(damage, 3);
        assert!(events.iter().any(|e| matches!(e, GameEvent::Respawned { .. })));
        assert!(matches!(
            events.last(),
            Some(GameEvent::GameOver { score: 0, best: 500 })
        ));

        let r = record.borrow();
        assert_eq!(r.lives, vec![3, 2, 1, 0]);
        assert_eq!(r.game_overs, vec![(0, 500)]);
        assert_eq!(r.cues.iter().filter(|c| **c == Cue::Hit).count(), 3);
        assert_eq!(r.cues.last(), Some(&Cue::GameOver));
        // No record beaten, nothing written
        assert!(r.saves.is_empty());
        assert_eq!(r.best.first(), Some(&500));
        drop(r);

        // Frozen after game over
        let frozen = game.snapshot();
        assert!(game.tick(&FrameInput::default(), DT).is_empty());
        assert_eq!(game.snapshot(), frozen);
    }

    #[test]
    fn test_ghost_absorbs_repeated_falls() {
        let mut tuning = doomed();
        tuning.player.ghost_duration = 1.0;
        let (mut game, record) = recorded_game(tuning, 0);
        game.start_run(8);

        // Half a second of falling every frame costs exactly one life
        for _ in 0..30 {
            game.tick(&FrameInput::default(), DT);
        }
        assert_eq!(game.run().lives, 2);
        assert!(game.ball().is_ghost());
        assert!(game.run().modifiers.is_slowed());
        assert_eq!(record.borrow().lives, vec![3, 2]);
    }

    #[test]
    fn test_new_run_after_game_over() {
        let (mut game, record) = recorded_game(doomed(), 0);
        game.start_run(1);
        for _ in 0..120 {
            game.tick(&FrameInput::default(), DT);
        }
        assert_eq!(game.phase(), GamePhase::GameOver);

        game.start_run(2);
        assert_eq!(game.phase(), GamePhase::Playing);
        assert_eq!(game.run().lives, 3);
        assert_eq!(game.track().len(), 25);
        assert_eq!(record.borrow().banners.last(), Some(&1));
        assert_no_leaks(&game);
    }
}
