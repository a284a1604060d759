//! Gameplay audio cues
//!
//! The core fires cues and forgets them. Multi-note cues are expanded into
//! tones by [`CueSequencer`], which staggers notes with an elapsed-time queue
//! advanced every tick instead of detached timers.

use serde::{Deserialize, Serialize};

/// Gameplay events that make a sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cue {
    /// Dot picked up
    CollectCommon,
    /// Diamond picked up
    CollectRare,
    /// Flew through a hoop
    CollectRarest,
    /// Speed boost picked up
    CollectBoost,
    /// Lost a life
    Hit,
    LevelUp,
    GameOver,
}

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

/// A single synthesized note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    pub freq: f32,
    /// Exponential sweep target, if the pitch slides
    pub sweep_to: Option<f32>,
    pub duration: f32,
    pub waveform: Waveform,
    pub volume: f32,
}

const fn tone(freq: f32, duration: f32, waveform: Waveform, volume: f32) -> Tone {
    Tone {
        freq,
        sweep_to: None,
        duration,
        waveform,
        volume,
    }
}

use Waveform::*;

const COLLECT_COMMON: &[(f32, Tone)] = &[
    (0.0, tone(880.0, 0.1, Sine, 0.15)),
    (0.05, tone(1100.0, 0.1, Sine, 0.1)),
];
const COLLECT_RARE: &[(f32, Tone)] = &[
    (0.0, tone(660.0, 0.15, Sine, 0.2)),
    (0.08, tone(880.0, 0.15, Sine, 0.15)),
    (0.16, tone(1320.0, 0.2, Sine, 0.1)),
];
const COLLECT_RAREST: &[(f32, Tone)] = &[
    (0.0, tone(440.0, 0.2, Triangle, 0.2)),
    (0.1, tone(660.0, 0.2, Triangle, 0.15)),
    (0.2, tone(880.0, 0.3, Triangle, 0.1)),
];
const COLLECT_BOOST: &[(f32, Tone)] = &[(
    0.0,
    Tone {
        freq: 200.0,
        sweep_to: Some(800.0),
        duration: 0.3,
        waveform: Triangle,
        volume: 0.25,
    },
)];
const HIT: &[(f32, Tone)] = &[
    (0.0, tone(150.0, 0.3, Sawtooth, 0.3)),
    (0.0, tone(100.0, 0.4, Square, 0.1)),
];
const LEVEL_UP: &[(f32, Tone)] = &[
    (0.0, tone(523.0, 0.15, Sine, 0.2)),
    (0.1, tone(659.0, 0.15, Sine, 0.2)),
    (0.2, tone(784.0, 0.15, Sine, 0.2)),
    (0.3, tone(1047.0, 0.3, Sine, 0.15)),
];
const GAME_OVER: &[(f32, Tone)] = &[
    (0.0, tone(440.0, 0.3, Sawtooth, 0.2)),
    (0.2, tone(330.0, 0.3, Sawtooth, 0.2)),
    (0.4, tone(220.0, 0.5, Sawtooth, 0.15)),
];

impl Cue {
    /// Notes of this cue as (delay seconds, tone)
    pub fn pattern(self) -> &'static [(f32, Tone)] {
        match self {
            Cue::CollectCommon => COLLECT_COMMON,
            Cue::CollectRare => COLLECT_RARE,
            Cue::CollectRarest => COLLECT_RAREST,
            Cue::CollectBoost => COLLECT_BOOST,
            Cue::Hit => HIT,
            Cue::LevelUp => LEVEL_UP,
            Cue::GameOver => GAME_OVER,
        }
    }
}

/// Audio collaborator: fire-and-forget cues
pub trait AudioSink {
    fn play(&mut self, cue: Cue);

    /// Called once per tick so sinks with pending notes can release them
    fn advance(&mut self, _dt: f32) {}
}

/// Discards every cue
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _cue: Cue) {}
}

/// Synthesizer collaborator: plays one tone right now
pub trait ToneSink {
    fn play_tone(&mut self, tone: Tone);
}

/// Elapsed-time queue that releases staggered notes as the clock passes them
#[derive(Debug, Default)]
pub struct CueSequencer {
    clock: f32,
    /// (due time, tone), kept sorted by due time
    pending: Vec<(f32, Tone)>,
}

impl CueSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every note of a cue relative to now
    pub fn enqueue(&mut self, cue: Cue) {
        for &(delay, tone) in cue.pattern() {
            self.pending.push((self.clock + delay, tone));
        }
        self.pending
            .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    }

    /// Advance the clock and return every note that became due, in order
    pub fn advance(&mut self, dt: f32) -> Vec<Tone> {
        self.clock += dt.max(0.0);
        let due = self.pending.partition_point(|(t, _)| *t <= self.clock);
        self.pending.drain(..due).map(|(_, tone)| tone).collect()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Audio sink that expands cues into tones and feeds a synthesizer
pub struct SequencedAudio<T: ToneSink> {
    sequencer: CueSequencer,
    synth: T,
    master_volume: f32,
    muted: bool,
}

impl<T: ToneSink> SequencedAudio<T> {
    pub fn new(synth: T) -> Self {
        Self {
            sequencer: CueSequencer::new(),
            synth,
            master_volume: 0.3,
            muted: false,
        }
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Mute/unmute; muting drops queued notes
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if muted {
            self.sequencer.clear();
        }
    }

    pub fn synth(&self) -> &T {
        &self.synth
    }
}

impl<T: ToneSink> AudioSink for SequencedAudio<T> {
    fn play(&mut self, cue: Cue) {
        if !self.muted {
            self.sequencer.enqueue(cue);
        }
    }

    fn advance(&mut self, dt: f32) {
        for mut tone in self.sequencer.advance(dt) {
            tone.volume *= self.master_volume;
            self.synth.play_tone(tone);
        }
    }
}
