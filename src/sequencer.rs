//! Look-ahead beat scheduler.
//!
//! The host polls [`Sequencer::update`] from its frame loop. Each poll
//! schedules every sixteenth-note tick that falls within `lookahead` seconds
//! of the audio clock, handing callbacks the exact audio-clock time of the
//! tick. Callbacks therefore run a little early and use that time to schedule
//! their sound precisely, while the poll itself can jitter by up to the
//! look-ahead window without being heard.

use serde::{Deserialize, Serialize};

use crate::error::{check_f64, Error, Result};
use crate::graph::Clock;

pub const STEPS_PER_BAR: u32 = 16;

/// Musical subdivisions a callback can be bound to, coarsest first. This is
/// also the priority order when only one callback may fire per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subdivision {
    Whole,
    Half,
    Quarter,
    Sixth,
    Eighth,
    Sixteenth,
}

impl Subdivision {
    pub const ALL: [Subdivision; 6] = [
        Subdivision::Whole,
        Subdivision::Half,
        Subdivision::Quarter,
        Subdivision::Sixth,
        Subdivision::Eighth,
        Subdivision::Sixteenth,
    ];

    /// Whether this subdivision lands on sixteenth step `step` of a bar.
    pub fn fires_on(self, step: u32) -> bool {
        match self {
            Subdivision::Whole => step == 0,
            Subdivision::Half => step % 2 == 0,
            Subdivision::Quarter => step % 4 == 0,
            Subdivision::Sixth => step % 6 == 0,
            Subdivision::Eighth => step % 8 == 0,
            Subdivision::Sixteenth => true,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Which steps are eligible at all; coarser settings skip the rest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteResolution {
    #[default]
    Sixteenth,
    Eighth,
    Quarter,
}

impl NoteResolution {
    pub fn admits(self, step: u32) -> bool {
        match self {
            NoteResolution::Sixteenth => true,
            NoteResolution::Eighth => step % 2 == 0,
            NoteResolution::Quarter => step % 4 == 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub tempo: f64,
    /// Seconds of audio scheduled ahead of the clock on every update.
    pub lookahead: f64,
    pub resolution: NoteResolution,
    /// Fire every matching subdivision on a tick, rather than only the coarsest.
    pub multitrack: bool,
    pub bars: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            lookahead: 0.1,
            resolution: NoteResolution::Sixteenth,
            multitrack: true,
            bars: 1,
        }
    }
}

impl SequencerConfig {
    fn validate(&self) -> Result<()> {
        let tempo = check_f64("tempo", self.tempo)?;
        let lookahead = check_f64("lookahead", self.lookahead)?;
        if tempo <= 0.0 {
            return Err(Error::InvalidConfig(format!("tempo must be positive, got {tempo}")));
        }
        if lookahead < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "lookahead must not be negative, got {lookahead}"
            )));
        }
        if self.bars == 0 {
            return Err(Error::InvalidConfig("bars must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// Argument to the single-call transport of older hosts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleKind {
    /// Play from the top, or stop.
    Stop,
    /// Resume where it left off, or pause.
    Pause,
}

pub type Callback = Box<dyn FnMut(f64)>;

pub struct Sequencer<C: Clock> {
    clock: C,
    config: SequencerConfig,
    callbacks: [Option<Callback>; 6],
    state: TransportState,
    step: u32,
    bar: u32,
    next_time: f64,
    last_scheduled: Option<u32>,
}

impl<C: Clock> Sequencer<C> {
    pub fn new(clock: C, config: SequencerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            clock,
            config,
            callbacks: Default::default(),
            state: TransportState::Stopped,
            step: 0,
            bar: 0,
            next_time: 0.0,
            last_scheduled: None,
        })
    }

    /// Binds `callback` to a subdivision, replacing any previous one.
    pub fn on(&mut self, subdivision: Subdivision, callback: impl FnMut(f64) + 'static) -> &mut Self {
        self.callbacks[subdivision.index()] = Some(Box::new(callback));
        self
    }

    pub fn clear(&mut self, subdivision: Subdivision) {
        self.callbacks[subdivision.index()] = None;
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn tempo(&self) -> f64 {
        self.config.tempo
    }

    /// Takes effect from the next tick; already scheduled ticks keep their time.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<()> {
        let bpm = check_f64("tempo", bpm)?;
        if bpm <= 0.0 {
            return Err(Error::InvalidConfig(format!("tempo must be positive, got {bpm}")));
        }
        self.config.tempo = bpm;
        Ok(())
    }

    pub fn set_resolution(&mut self, resolution: NoteResolution) {
        self.config.resolution = resolution;
    }

    pub fn set_multitrack(&mut self, multitrack: bool) {
        self.config.multitrack = multitrack;
    }

    /// Sixteenth step (0..16) of the next tick to be scheduled.
    pub fn current_step(&self) -> u32 {
        self.step
    }

    pub fn current_bar(&self) -> u32 {
        self.bar
    }

    /// Step of the most recently scheduled tick, if any since the last play.
    pub fn last_scheduled(&self) -> Option<u32> {
        self.last_scheduled
    }

    /// Audio-clock time of the next tick.
    pub fn next_time(&self) -> f64 {
        self.next_time
    }

    pub fn sixteenth_duration(&self) -> f64 {
        0.25 * (60.0 / self.config.tempo)
    }

    /// Starts from the top when stopped, resumes in place when paused.
    pub fn play(&mut self) {
        match self.state {
            TransportState::Playing => return,
            TransportState::Stopped => {
                self.step = 0;
                self.bar = 0;
            }
            TransportState::Paused => {}
        }
        self.next_time = self.clock.current_time();
        self.last_scheduled = None;
        self.state = TransportState::Playing;
        log::info!("play at step {} bar {}", self.step, self.bar);
    }

    pub fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
            log::info!("pause at step {} bar {}", self.step, self.bar);
        }
    }

    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.step = 0;
        self.bar = 0;
        self.last_scheduled = None;
        log::info!("stop");
    }

    /// One-button transport: `Stop` toggles play/stop, `Pause` toggles
    /// play/pause.
    pub fn toggle(&mut self, kind: ToggleKind) {
        match (self.state, kind) {
            (TransportState::Playing, ToggleKind::Stop) => self.stop(),
            (TransportState::Playing, ToggleKind::Pause) => self.pause(),
            (TransportState::Paused, ToggleKind::Stop) => {
                self.stop();
                self.play();
            }
            _ => self.play(),
        }
    }

    /// Schedules every tick due within the look-ahead window. Does nothing
    /// unless playing.
    pub fn update(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }
        let now = self.clock.current_time();
        if self.next_time + self.config.lookahead < now {
            log::warn!(
                "scheduler fell {:.3}s behind the audio clock",
                now - self.next_time
            );
        }
        while self.next_time < now + self.config.lookahead {
            self.schedule(self.step, self.next_time);
            self.advance();
        }
    }

    fn schedule(&mut self, step: u32, time: f64) {
        self.last_scheduled = Some(step);
        if !self.config.resolution.admits(step) {
            return;
        }
        if self.config.multitrack {
            for sub in Subdivision::ALL {
                if sub.fires_on(step) {
                    if let Some(cb) = self.callbacks[sub.index()].as_mut() {
                        cb(time);
                    }
                }
            }
        } else {
            let first = Subdivision::ALL
                .into_iter()
                .find(|sub| sub.fires_on(step) && self.callbacks[sub.index()].is_some());
            if let Some(cb) = first.and_then(|sub| self.callbacks[sub.index()].as_mut()) {
                cb(time);
            }
        }
    }

    fn advance(&mut self) {
        self.next_time += self.sixteenth_duration();
        self.step += 1;
        if self.step == STEPS_PER_BAR {
            self.step = 0;
            self.bar = (self.bar + 1) % self.config.bars;
        }
    }
}
