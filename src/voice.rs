use serde::{Deserialize, Serialize};

use crate::error::{check, check_f64, Result};
use crate::graph::{Graph, NodeId, NodeKind, Param, Waveform};
use crate::sequencer::Subdivision;

const DECAY_STEPS: u32 = 8;

/// A percussive tone bound to one subdivision, as written in a patch file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSpec {
    pub subdivision: Subdivision,
    pub waveform: Waveform,
    pub frequency: f32,
    pub level: f32,
    /// Seconds from peak to silence.
    pub decay: f64,
}

impl Default for VoiceSpec {
    fn default() -> Self {
        Self {
            subdivision: Subdivision::Quarter,
            waveform: Waveform::Sine,
            frequency: 220.0,
            level: 0.5,
            decay: 0.15,
        }
    }
}

/// Oscillator through an envelope gain that sits at zero until triggered.
pub struct Voice {
    graph: Graph,
    osc: NodeId,
    env: NodeId,
    level: f32,
    decay: f64,
}

impl Voice {
    pub fn new(graph: &Graph, spec: &VoiceSpec, target: NodeId) -> Result<Self> {
        let frequency = check("frequency", spec.frequency)?;
        let level = check("level", spec.level)?;
        let decay = check_f64("decay", spec.decay)?.max(0.0);

        let osc = graph.create_node(NodeKind::Oscillator {
            waveform: spec.waveform,
            frequency,
        });
        let env = graph.create_node(NodeKind::Gain { gain: 0.0 });
        graph.connect(osc, env);
        graph.connect(env, target);
        Ok(Self {
            graph: graph.clone(),
            osc,
            env,
            level,
            decay,
        })
    }

    pub fn nodes(&self) -> [NodeId; 2] {
        [self.osc, self.env]
    }

    /// Schedules a hit at `time` on the audio clock.
    pub fn trigger(&self, time: f64) {
        self.graph.cancel_scheduled(self.env, Param::Gain, time);
        self.graph.set_param(self.env, Param::Gain, self.level, time);
        for k in 1..=DECAY_STEPS {
            let remaining = 1.0 - k as f32 / DECAY_STEPS as f32;
            let at = time + self.decay * k as f64 / DECAY_STEPS as f64;
            self.graph
                .set_param(self.env, Param::Gain, self.level * remaining * remaining, at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RecordingGraph;
    use std::rc::Rc;

    #[test]
    fn trigger_peaks_then_falls_silent() {
        let rec = Rc::new(RecordingGraph::new());
        let graph: Graph = rec.clone();
        let voice = Voice::new(&graph, &VoiceSpec::default(), graph.destination()).unwrap();
        let [_, env] = voice.nodes();
        voice.trigger(1.0);
        assert_eq!(rec.param_value_at(env, Param::Gain, 0.99), Some(0.0));
        assert_eq!(rec.param_value_at(env, Param::Gain, 1.0), Some(0.5));
        let mid = rec.param_value_at(env, Param::Gain, 1.08).unwrap();
        assert!(mid > 0.0 && mid < 0.5);
        assert_eq!(rec.param_value_at(env, Param::Gain, 1.2), Some(0.0));
    }
}
