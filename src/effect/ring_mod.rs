use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_config, Effect, EffectLoop, EffectOptions, EffectStage};
use crate::error::{check, Result};
use crate::graph::{Graph, NodeId, NodeKind, Param, Waveform};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingModConfig {
    /// Carrier exponent: the carrier runs at `2^frequency` Hz.
    pub frequency: f32,
    #[serde(flatten)]
    pub options: EffectOptions,
}

impl Default for RingModConfig {
    fn default() -> Self {
        Self {
            frequency: 11.0,
            options: EffectOptions::default(),
        }
    }
}

impl RingModConfig {
    pub fn from_json(config: Option<&Value>) -> Result<Self> {
        parse_config(config)
    }
}

fn carrier_hz(exponent: f32) -> f32 {
    2f32.powf(exponent)
}

/// Multiplies the signal by a sine carrier: the carrier drives the gain of a
/// stage whose own gain is zero.
pub struct RingMod {
    fx: EffectLoop,
    graph: Graph,
    carrier: NodeId,
    ring: NodeId,
    frequency: f32,
}

impl RingMod {
    pub fn new(graph: &Graph, config: &RingModConfig) -> Result<Self> {
        let frequency = check("frequency", config.frequency)?;
        let ring = graph.create_node(NodeKind::Gain { gain: 0.0 });
        let carrier = graph.create_node(NodeKind::Oscillator {
            waveform: Waveform::Sine,
            frequency: carrier_hz(frequency),
        });
        graph.connect_param(carrier, ring, Param::Gain);

        let fx = EffectLoop::new(graph, EffectStage { entry: ring, exit: ring }, &config.options)?;
        log::debug!("ring mod: carrier {} Hz", carrier_hz(frequency));
        Ok(Self {
            fx,
            graph: graph.clone(),
            carrier,
            ring,
            frequency,
        })
    }

    /// The exponent, not Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn set_frequency(&mut self, value: f32) -> Result<()> {
        self.frequency = check("frequency", value)?;
        let hz = self.carrier_frequency();
        self.graph
            .set_param(self.carrier, Param::Frequency, hz, self.graph.current_time());
        Ok(())
    }

    /// Carrier rate in Hz, derived from the stored exponent on every call.
    pub fn carrier_frequency(&self) -> f32 {
        carrier_hz(self.frequency)
    }
}

impl Effect for RingMod {
    fn name(&self) -> &'static str {
        "ring_mod"
    }

    fn effect_loop(&self) -> &EffectLoop {
        &self.fx
    }

    fn effect_loop_mut(&mut self) -> &mut EffectLoop {
        &mut self.fx
    }

    fn stage_nodes(&self) -> Vec<NodeId> {
        vec![self.ring, self.carrier]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RecordingGraph, Target};
    use std::rc::Rc;

    #[test]
    fn default_carrier_is_2048_hz() {
        let rec = Rc::new(RecordingGraph::new());
        let graph: Graph = rec.clone();
        let rm = RingMod::new(&graph, &RingModConfig::default()).unwrap();
        assert_eq!(rm.frequency(), 11.0);
        assert_eq!(rm.carrier_frequency(), 2048.0);
        assert_eq!(rec.param_value(rm.carrier, Param::Frequency), Some(2048.0));
        assert_eq!(rec.param_value(rm.ring, Param::Gain), Some(0.0));
        assert!(rec.is_connected(rm.carrier, Target::Param(rm.ring, Param::Gain)));
    }

    #[test]
    fn fractional_exponents() {
        let rec = Rc::new(RecordingGraph::new());
        let graph: Graph = rec.clone();
        let mut rm = RingMod::new(&graph, &RingModConfig::default()).unwrap();
        rm.set_frequency(8.5).unwrap();
        let expected = 2f32.powf(8.5);
        assert_eq!(rm.carrier_frequency(), expected);
        assert_eq!(rec.param_value(rm.carrier, Param::Frequency), Some(expected));
    }
}
