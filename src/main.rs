//! Marble Runner headless entry point
//!
//! Plays one run with a simple autopilot against the headless scene and logs
//! the outcome. Useful for soak-testing generation and physics without a
//! renderer.
//!
//! Usage: `marble-runner [seed] [--tuning <file>] [--best <file>] [--seconds <n>] [--viewport <w>x<h>]`

use marble_runner::audio::NullAudio;
use marble_runner::persistence::{JsonFileStore, MemoryStore, ScoreStore};
use marble_runner::platform::{FrameInput, HeadlessScene, LogHud};
use marble_runner::sim::{Game, GameEvent, GamePhase, ObstacleView, SegmentKind, Snapshot};
use marble_runner::tuning::Tuning;

const FRAME_DT: f32 = 1.0 / 60.0;
/// How far ahead the autopilot looks for things to steer at
const LOOK_AHEAD: f32 = 40.0;

#[derive(Debug)]
struct Args {
    seed: u64,
    tuning: Option<String>,
    best: Option<String>,
    seconds: f32,
    viewport: (u32, u32),
}

fn parse_args() -> Args {
    let mut args = Args {
        seed: 1,
        tuning: None,
        best: None,
        seconds: 60.0,
        viewport: (1280, 720),
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--tuning" => args.tuning = it.next(),
            "--best" => args.best = it.next(),
            "--seconds" => {
                if let Some(s) = it.next().and_then(|s| s.parse().ok()) {
                    args.seconds = s;
                }
            }
            "--viewport" => match it.next().as_deref().and_then(parse_viewport) {
                Some(size) => args.viewport = size,
                None => log::warn!("Expected --viewport <w>x<h>"),
            },
            other => match other.parse() {
                Ok(seed) => args.seed = seed,
                Err(_) => log::warn!("Ignoring unknown argument {other:?}"),
            },
        }
    }
    args
}

fn parse_viewport(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Steer at the nearest item ahead, hop low bars, walls and gaps
fn autopilot(snapshot: &Snapshot, gap_ahead: bool) -> FrameInput {
    let ball = snapshot.ball_position;
    let ahead = |z: f32| z < ball.z && ball.z - z < LOOK_AHEAD;

    let target = snapshot
        .collectibles
        .iter()
        .filter(|c| !c.collected && ahead(c.position.z))
        .min_by(|a, b| b.position.z.total_cmp(&a.position.z))
        .map(|c| c.position.x);

    let hop = snapshot.obstacles.iter().any(|o: &ObstacleView| {
        ahead(o.z) && ball.z - o.z < 6.0 && matches!(o.kind, "low_bar" | "static_wall")
    });

    FrameInput {
        steer_to_world_x: target,
        jump_requested: hop || gap_ahead,
        ..FrameInput::default()
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[cfg(target_arch = "wasm32")]
fn init_logging() {}

fn main() {
    init_logging();
    let args = parse_args();
    log::info!("Marble Runner (headless) starting, seed {}", args.seed);

    let tuning = match &args.tuning {
        Some(path) => Tuning::load_or_default(path),
        None => Tuning::default(),
    };
    let store: Box<dyn ScoreStore> = match &args.best {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::default()),
    };

    let mut game = Game::new(
        tuning,
        HeadlessScene::new(),
        Box::new(LogHud::default()),
        Box::new(NullAudio),
        store,
    );
    game.resize(args.viewport.0, args.viewport.1);
    game.start_run(args.seed);

    let frames = (args.seconds / FRAME_DT).ceil() as u32;
    let (mut jumps, mut hits, mut pickups) = (0u32, 0u32, 0u32);
    for _ in 0..frames {
        let snapshot = game.snapshot();
        let ball_z = snapshot.ball_position.z;
        let gap_ahead = game
            .track()
            .segment_at(ball_z - 8.0)
            .is_some_and(|s| s.kind == SegmentKind::Gap);
        let input = autopilot(&snapshot, gap_ahead);

        for event in game.tick(&input, FRAME_DT) {
            match event {
                GameEvent::Jumped => jumps += 1,
                GameEvent::Damaged { .. } => hits += 1,
                GameEvent::Collected { .. } => pickups += 1,
                _ => {}
            }
        }
        if game.phase() == GamePhase::GameOver {
            break;
        }
    }

    let snapshot = game.snapshot();
    log::info!(
        "Finished: {:?} after {:.1}s, score {}, level {}, lives {}, {} pickups, {} hits, {} jumps",
        snapshot.phase,
        snapshot.elapsed,
        snapshot.score,
        snapshot.level,
        snapshot.lives,
        pickups,
        hits,
        jumps
    );
    log::info!(
        "Live content: {} segments, {} obstacles, {} collectibles, {} bodies, {} visuals",
        game.track().len(),
        game.obstacles().len(),
        game.collectibles().len(),
        game.world().body_count(),
        game.scene().live_count()
    );
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{json}"),
        Err(e) => log::warn!("Could not serialize snapshot: {e}"),
    }
}
