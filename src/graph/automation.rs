use std::collections::VecDeque;

/// Discrete updates per second of a gain ramp.
pub const RAMP_STEPS_PER_SECOND: f64 = 60.0;

// after the final step the remaining distance would be e^-5 (< 1%) before snapping
const RAMP_TIME_CONSTANTS: f64 = 5.0;

/// An exponential approach from `from` to `to` over `duration` seconds,
/// quantised to [`RAMP_STEPS_PER_SECOND`] steps. Step `k` (1-based) takes
/// effect at `start + (k - 1) * step_len`; the last step lands exactly on `to`.
///
/// Evaluated in closed form, so a ramp costs the same however long it is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ramp {
    pub from: f32,
    pub to: f32,
    pub start: f64,
    pub duration: f64,
}

impl Ramp {
    pub fn immediate(level: f32, at: f64) -> Self {
        Self {
            from: level,
            to: level,
            start: at,
            duration: 0.0,
        }
    }

    pub fn steps(&self) -> f64 {
        (self.duration * RAMP_STEPS_PER_SECOND).ceil().max(1.0)
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration.max(0.0)
    }

    pub fn level_at(&self, t: f64) -> f32 {
        if self.duration <= 0.0 || t >= self.end() {
            return self.to;
        }
        if t < self.start {
            return self.from;
        }
        let n = self.steps();
        let k = ((t - self.start) / (self.duration / n)).floor() + 1.0;
        if k >= n {
            return self.to;
        }
        let remaining = (-RAMP_TIME_CONSTANTS * k / n).exp() as f32;
        self.to + (self.from - self.to) * remaining
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Segment {
    Hold(f32),
    Ramp(Ramp),
}

impl Segment {
    fn value(&self, t: f64) -> f32 {
        match self {
            Segment::Hold(v) => *v,
            Segment::Ramp(r) => r.level_at(t),
        }
    }
}

/// Timeline of values scheduled on one parameter.
///
/// Events are kept sorted by time. An event scheduled at the same time as an
/// existing one lands after it, so the later call wins. A ramp is a single
/// event that governs the parameter until the next one.
#[derive(Clone, Debug, PartialEq)]
pub struct Automation {
    current: Segment,
    events: VecDeque<(f64, Segment)>,
}

impl Automation {
    pub fn new(value: f32) -> Self {
        Self {
            current: Segment::Hold(value),
            events: VecDeque::new(),
        }
    }

    fn insert(&mut self, at: f64, segment: Segment) {
        let idx = self.events.partition_point(|(t, _)| *t <= at);
        self.events.insert(idx, (at, segment));
    }

    pub fn set_at(&mut self, at: f64, value: f32) {
        self.insert(at, Segment::Hold(value));
    }

    pub fn ramp(&mut self, ramp: Ramp) {
        self.insert(ramp.start, Segment::Ramp(ramp));
    }

    pub fn cancel_from(&mut self, from: f64) {
        self.events.retain(|(t, _)| *t < from);
    }

    /// Value in effect at `t`, without consuming anything.
    pub fn value_at(&self, t: f64) -> f32 {
        self.events
            .iter()
            .take_while(|(at, _)| *at <= t)
            .last()
            .map_or(&self.current, |(_, s)| s)
            .value(t)
    }

    /// Applies every event due by `t` and returns the resulting value. Used on
    /// the audio thread where time only moves forward.
    pub fn advance(&mut self, t: f64) -> f32 {
        while let Some(&(at, segment)) = self.events.front() {
            if at > t {
                break;
            }
            self.current = segment;
            self.events.pop_front();
        }
        self.current.value(t)
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }
}
