//! Dry/wet effect loops and the effects built on them.
//!
//! Every effect owns an [`EffectLoop`]: an input junction that splits into a
//! dry path and a path through the effect's own processing stage, both summed
//! into one output gain. The stage must exist before the loop is built, so
//! [`EffectLoop::new`] takes it as an argument.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{check, check_f64, Error, Result};
use crate::gain::GainChannel;
use crate::graph::{Graph, NodeId, NodeKind, Param};

mod chorus;
mod drive;
mod flanger;
mod modulation;
mod ring_mod;

pub use chorus::{Chorus, ChorusConfig};
pub use drive::{Drive, DriveConfig, MIN_DRIVE};
pub use flanger::{Flanger, FlangerConfig};
pub use ring_mod::{RingMod, RingModConfig};

/// Options every effect accepts on top of its own seeds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectOptions {
    /// Where the output goes. Not part of the JSON form.
    #[serde(skip)]
    pub connect: Option<NodeId>,
    /// Initial output gain.
    pub gain: f32,
    /// Initial dry level; the wet level follows as `1 - dry`.
    pub dry: Option<f32>,
}

impl Default for EffectOptions {
    fn default() -> Self {
        Self {
            connect: None,
            gain: 1.0,
            dry: None,
        }
    }
}

/// Absent or null gives the defaults; anything that isn't an object is refused.
pub(crate) fn parse_config<T: DeserializeOwned + Default>(config: Option<&Value>) -> Result<T> {
    match config {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v @ Value::Object(_)) => Ok(T::deserialize(v)?),
        Some(other) => Err(Error::InvalidConfig(format!(
            "effect configuration must be an object, got {other}"
        ))),
    }
}

/// Entry and exit of an effect's processing stage. They may be the same node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectStage {
    pub entry: NodeId,
    pub exit: NodeId,
}

pub struct EffectLoop {
    graph: Graph,
    input: NodeId,
    output: NodeId,
    dry: GainChannel,
    wet: GainChannel,
    stage: EffectStage,
    gain: f32,
}

impl EffectLoop {
    pub fn new(graph: &Graph, stage: EffectStage, options: &EffectOptions) -> Result<Self> {
        let gain = check("gain", options.gain)?;
        if let Some(dry) = options.dry {
            check("dry", dry)?;
        }

        let input = graph.create_node(NodeKind::Gain { gain: 1.0 });
        let dry = GainChannel::new(graph, 0.0);
        let wet = GainChannel::new(graph, 1.0);
        let output = graph.create_node(NodeKind::Gain { gain });

        graph.connect(input, dry.node());
        graph.connect(dry.node(), output);
        graph.connect(input, stage.entry);
        graph.connect(stage.exit, wet.node());
        graph.connect(wet.node(), output);
        if let Some(target) = options.connect {
            graph.connect(output, target);
        }

        let mut fx = Self {
            graph: graph.clone(),
            input,
            output,
            dry,
            wet,
            stage,
            gain,
        };
        if let Some(dry) = options.dry {
            fx.set_dry(dry)?;
        }
        Ok(fx)
    }

    pub fn input(&self) -> NodeId {
        self.input
    }

    pub fn output(&self) -> NodeId {
        self.output
    }

    pub fn stage(&self) -> EffectStage {
        self.stage
    }

    pub fn dry(&self) -> f32 {
        self.dry.level()
    }

    pub fn wet(&self) -> f32 {
        self.wet.level()
    }

    pub fn dry_channel(&self) -> &GainChannel {
        &self.dry
    }

    pub fn wet_channel(&self) -> &GainChannel {
        &self.wet
    }

    /// Sets the dry level and the wet level to its complement, immediately.
    pub fn set_dry(&mut self, value: f32) -> Result<()> {
        let value = check("dry", value)?;
        self.mix(value, 1.0 - value, 0.0)
    }

    pub fn set_wet(&mut self, value: f32) -> Result<()> {
        let value = check("wet", value)?;
        self.mix(1.0 - value, value, 0.0)
    }

    /// Ramped form of [`set_dry`](Self::set_dry).
    pub fn set_dry_gain(&mut self, value: f32, ramp_seconds: f64) -> Result<()> {
        let value = check("dry", value)?;
        self.mix(value, 1.0 - value, ramp_seconds)
    }

    /// Ramped form of [`set_wet`](Self::set_wet).
    pub fn set_wet_gain(&mut self, value: f32, ramp_seconds: f64) -> Result<()> {
        let value = check("wet", value)?;
        self.mix(1.0 - value, value, ramp_seconds)
    }

    fn mix(&mut self, dry: f32, wet: f32, ramp_seconds: f64) -> Result<()> {
        // validated up front so a bad ramp can't leave one channel moved
        check_f64("ramp", ramp_seconds)?;
        self.dry.set_level(dry, ramp_seconds)?;
        self.wet.set_level(wet, ramp_seconds)?;
        log::debug!("mix dry={dry} wet={wet} ramp={ramp_seconds}s");
        Ok(())
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, value: f32) -> Result<()> {
        self.gain = check("gain", value)?;
        self.graph
            .set_param(self.output, Param::Gain, self.gain, self.graph.current_time());
        Ok(())
    }

    pub fn connect(&self, target: NodeId) {
        self.graph.connect(self.output, target);
    }

    pub fn disconnect(&self) {
        self.graph.disconnect(self.output);
    }

    /// Removes every edge the loop itself added.
    pub fn teardown(&self) {
        for node in [self.input, self.dry.node(), self.wet.node(), self.output] {
            self.graph.disconnect(node);
        }
        self.graph.disconnect(self.stage.exit);
    }
}

/// The dry/wet contract shared by every effect, plus routing.
pub trait Effect {
    fn name(&self) -> &'static str;

    fn effect_loop(&self) -> &EffectLoop;

    fn effect_loop_mut(&mut self) -> &mut EffectLoop;

    /// Nodes the effect created for its processing stage.
    fn stage_nodes(&self) -> Vec<NodeId>;

    fn input(&self) -> NodeId {
        self.effect_loop().input()
    }

    fn output(&self) -> NodeId {
        self.effect_loop().output()
    }

    fn dry(&self) -> f32 {
        self.effect_loop().dry()
    }

    fn wet(&self) -> f32 {
        self.effect_loop().wet()
    }

    fn set_dry(&mut self, value: f32) -> Result<()> {
        self.effect_loop_mut().set_dry(value)
    }

    fn set_wet(&mut self, value: f32) -> Result<()> {
        self.effect_loop_mut().set_wet(value)
    }

    fn set_dry_gain(&mut self, value: f32, ramp_seconds: f64) -> Result<()> {
        self.effect_loop_mut().set_dry_gain(value, ramp_seconds)
    }

    fn set_wet_gain(&mut self, value: f32, ramp_seconds: f64) -> Result<()> {
        self.effect_loop_mut().set_wet_gain(value, ramp_seconds)
    }

    fn connect(&self, target: NodeId) {
        self.effect_loop().connect(target)
    }

    fn disconnect(&self) {
        self.effect_loop().disconnect()
    }

    fn teardown(&self) {
        let fx = self.effect_loop();
        fx.teardown();
        for node in self.stage_nodes() {
            fx.graph.disconnect(node);
        }
    }
}

/// One effect and its seeds, as written in a patch file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectSpec {
    Chorus(ChorusConfig),
    Flanger(FlangerConfig),
    RingMod(RingModConfig),
    Drive(DriveConfig),
}

impl EffectSpec {
    pub fn build(&self, graph: &Graph, connect: Option<NodeId>) -> Result<Box<dyn Effect>> {
        Ok(match self {
            EffectSpec::Chorus(c) => {
                let mut c = c.clone();
                c.options.connect = connect;
                Box::new(Chorus::new(graph, &c)?)
            }
            EffectSpec::Flanger(c) => {
                let mut c = c.clone();
                c.options.connect = connect;
                Box::new(Flanger::new(graph, &c)?)
            }
            EffectSpec::RingMod(c) => {
                let mut c = c.clone();
                c.options.connect = connect;
                Box::new(RingMod::new(graph, &c)?)
            }
            EffectSpec::Drive(c) => {
                let mut c = c.clone();
                c.options.connect = connect;
                Box::new(Drive::new(graph, &c)?)
            }
        })
    }

    pub fn label(&self) -> String {
        match self {
            EffectSpec::Chorus(c) => format!("Chorus({} Hz, {} s)", c.speed, c.delay),
            EffectSpec::Flanger(c) => format!("Flanger({} Hz, fb {})", c.speed, c.feedback),
            EffectSpec::RingMod(c) => format!("RingMod(2^{})", c.frequency),
            EffectSpec::Drive(c) => format!("Drive({})", c.drive),
        }
    }
}

/// Effects wired in series: chain input -> first -> ... -> last -> destination.
pub struct EffectChain {
    graph: Graph,
    input: NodeId,
    effects: Vec<Box<dyn Effect>>,
}

impl EffectChain {
    pub fn build(graph: &Graph, specs: &[EffectSpec], destination: NodeId) -> Result<Self> {
        let mut effects = Vec::with_capacity(specs.len());
        for spec in specs {
            effects.push(spec.build(graph, None)?);
            log::debug!("chain: added {}", spec.label());
        }
        let input = graph.create_node(NodeKind::Gain { gain: 1.0 });
        let mut from = input;
        for fx in &effects {
            graph.connect(from, fx.input());
            from = fx.output();
        }
        graph.connect(from, destination);
        Ok(Self {
            graph: graph.clone(),
            input,
            effects,
        })
    }

    /// Where sources should connect.
    pub fn input(&self) -> NodeId {
        self.input
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Effect> {
        self.effects.get(index).map(|fx| fx.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Effect + 'static)> {
        self.effects.get_mut(index).map(|fx| fx.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Effect> {
        self.effects.iter().map(|fx| fx.as_ref())
    }

    pub fn teardown(&self) {
        self.graph.disconnect(self.input);
        for fx in &self.effects {
            fx.teardown();
        }
    }
}
