use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::modulation::ModulatedDelay;
use super::{parse_config, Effect, EffectLoop, EffectOptions, EffectStage};
use crate::error::Result;
use crate::graph::{Graph, NodeId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusConfig {
    /// LFO rate in Hz.
    pub speed: f32,
    /// Base delay in seconds.
    pub delay: f32,
    /// LFO swing applied to the delay time, in seconds.
    pub depth: f32,
    #[serde(flatten)]
    pub options: EffectOptions,
}

impl Default for ChorusConfig {
    fn default() -> Self {
        Self {
            speed: 3.5,
            delay: 0.03,
            depth: 0.002,
            options: EffectOptions::default(),
        }
    }
}

impl ChorusConfig {
    pub fn from_json(config: Option<&Value>) -> Result<Self> {
        parse_config(config)
    }
}

pub struct Chorus {
    fx: EffectLoop,
    modulation: ModulatedDelay,
}

impl Chorus {
    pub fn new(graph: &Graph, config: &ChorusConfig) -> Result<Self> {
        let modulation = ModulatedDelay::new(graph, config.speed, config.delay, config.depth)?;
        let line = modulation.delay_line();
        let fx = EffectLoop::new(graph, EffectStage { entry: line, exit: line }, &config.options)?;
        log::debug!("chorus: speed={} delay={} depth={}", config.speed, config.delay, config.depth);
        Ok(Self { fx, modulation })
    }

    pub fn speed(&self) -> f32 {
        self.modulation.speed()
    }

    pub fn set_speed(&mut self, value: f32) -> Result<()> {
        self.modulation.set_speed(value)
    }

    pub fn delay(&self) -> f32 {
        self.modulation.delay()
    }

    pub fn set_delay(&mut self, value: f32) -> Result<()> {
        self.modulation.set_delay(value)
    }

    pub fn depth(&self) -> f32 {
        self.modulation.depth()
    }

    pub fn set_depth(&mut self, value: f32) -> Result<()> {
        self.modulation.set_depth(value)
    }
}

impl Effect for Chorus {
    fn name(&self) -> &'static str {
        "chorus"
    }

    fn effect_loop(&self) -> &EffectLoop {
        &self.fx
    }

    fn effect_loop_mut(&mut self) -> &mut EffectLoop {
        &mut self.fx
    }

    fn stage_nodes(&self) -> Vec<NodeId> {
        self.modulation.nodes().to_vec()
    }
}
