use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::modulation::ModulatedDelay;
use super::{parse_config, Effect, EffectLoop, EffectOptions, EffectStage};
use crate::error::{check, Result};
use crate::graph::{Graph, NodeId, NodeKind, Param};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlangerConfig {
    pub speed: f32,
    pub delay: f32,
    pub depth: f32,
    /// Gain of the path from the delay output back into the delay input.
    pub feedback: f32,
    #[serde(flatten)]
    pub options: EffectOptions,
}

impl Default for FlangerConfig {
    fn default() -> Self {
        Self {
            speed: 0.25,
            delay: 0.005,
            depth: 0.002,
            feedback: 0.5,
            options: EffectOptions::default(),
        }
    }
}

impl FlangerConfig {
    pub fn from_json(config: Option<&Value>) -> Result<Self> {
        parse_config(config)
    }
}

/// Chorus topology with the delay output fed back into its own input, which
/// turns the sweep into a resonant comb.
pub struct Flanger {
    fx: EffectLoop,
    modulation: ModulatedDelay,
    feedback_gain: NodeId,
    feedback: f32,
    graph: Graph,
}

impl Flanger {
    pub fn new(graph: &Graph, config: &FlangerConfig) -> Result<Self> {
        let feedback = check("feedback", config.feedback)?;
        let modulation = ModulatedDelay::new(graph, config.speed, config.delay, config.depth)?;
        let line = modulation.delay_line();
        let feedback_gain = graph.create_node(NodeKind::Gain { gain: feedback });
        graph.connect(line, feedback_gain);
        graph.connect(feedback_gain, line);

        let fx = EffectLoop::new(graph, EffectStage { entry: line, exit: line }, &config.options)?;
        log::debug!(
            "flanger: speed={} delay={} depth={} feedback={feedback}",
            config.speed,
            config.delay,
            config.depth
        );
        Ok(Self {
            fx,
            modulation,
            feedback_gain,
            feedback,
            graph: graph.clone(),
        })
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

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_feedback(&mut self, value: f32) -> Result<()> {
        self.feedback = check("feedback", value)?;
        self.graph
            .set_param(self.feedback_gain, Param::Gain, self.feedback, self.graph.current_time());
        Ok(())
    }
}

impl Effect for Flanger {
    fn name(&self) -> &'static str {
        "flanger"
    }

    fn effect_loop(&self) -> &EffectLoop {
        &self.fx
    }

    fn effect_loop_mut(&mut self) -> &mut EffectLoop {
        &mut self.fx
    }

    fn stage_nodes(&self) -> Vec<NodeId> {
        let mut nodes = self.modulation.nodes().to_vec();
        nodes.push(self.feedback_gain);
        nodes
    }
}
