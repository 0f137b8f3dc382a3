use std::f32::consts::TAU;
use std::sync::Arc;

use crate::graph::{NodeKind, Waveform};

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Per-sample behaviour of one graph node on the audio thread.
pub enum Processor {
    /// Sums its inputs; used for the destination.
    Sum,
    Gain,
    Delay(DelayLine),
    Oscillator(Oscillator),
    WaveShaper(Arc<[f32]>),
}

impl Processor {
    pub fn from_kind(kind: &NodeKind, sample_rate: f32) -> Self {
        match kind {
            NodeKind::Gain { .. } => Processor::Gain,
            NodeKind::Delay { max_delay, .. } => {
                Processor::Delay(DelayLine::new(*max_delay, sample_rate))
            }
            NodeKind::Oscillator { waveform, .. } => Processor::Oscillator(Oscillator::new(*waveform)),
            NodeKind::WaveShaper { curve } => Processor::WaveShaper(curve.clone()),
        }
    }

    /// `param` is the node's parameter value for this frame, modulation included.
    pub fn process(&mut self, input: f32, param: f32, sample_rate: f32) -> f32 {
        match self {
            Processor::Sum => input,
            Processor::Gain => input * param,
            Processor::Delay(line) => line.process(input, param * sample_rate),
            Processor::Oscillator(osc) => osc.next(param, sample_rate),
            Processor::WaveShaper(curve) => shape(curve, input),
        }
    }
}

/// Fixed-capacity delay line read with linear interpolation.
pub struct DelayLine {
    buf: Vec<f32>,
    write: usize,
}

impl DelayLine {
    pub fn new(max_delay: f64, sample_rate: f32) -> Self {
        let len = (max_delay.max(0.0) * sample_rate as f64).ceil() as usize + 2;
        Self {
            buf: vec![0.0; len],
            write: 0,
        }
    }

    pub fn process(&mut self, input: f32, delay_samples: f32) -> f32 {
        let len = self.buf.len();
        self.buf[self.write] = input;
        // clamp so both interpolation taps stay inside the buffer
        let d = if delay_samples.is_finite() {
            delay_samples.clamp(0.0, (len - 2) as f32)
        } else {
            0.0
        };
        let whole = d.floor() as usize;
        let frac = d - whole as f32;
        let a = self.buf[(self.write + len - whole) % len];
        let b = self.buf[(self.write + len - whole - 1) % len];
        self.write = (self.write + 1) % len;
        lerp(a, b, frac)
    }
}

pub struct Oscillator {
    waveform: Waveform,
    phase: f32, // 0..1
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self { waveform, phase: 0.0 }
    }

    pub fn next(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let p = self.phase;
        let out = match self.waveform {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
        };
        let step = frequency / sample_rate;
        if step.is_finite() {
            self.phase = (self.phase + step).rem_euclid(1.0);
        }
        out
    }
}

/// Maps `x` in [-1, 1] across the whole curve and interpolates between the
/// two nearest entries. Inputs outside that range hit the end values.
pub fn shape(curve: &[f32], x: f32) -> f32 {
    match curve.len() {
        0 => x,
        1 => curve[0],
        len => {
            let last = (len - 1) as f32;
            let v = last * (x + 1.0) * 0.5;
            if !(v > 0.0) {
                curve[0]
            } else if v >= last {
                curve[len - 1]
            } else {
                let i = v.floor() as usize;
                lerp(curve[i], curve[i + 1], v - i as f32)
            }
        }
    }
}
