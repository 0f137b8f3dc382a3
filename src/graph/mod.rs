//! The audio-graph provider seen from the control thread.
//!
//! Effects and the sequencer never touch samples. They create nodes, wire
//! them together and schedule parameter values against a shared monotonic
//! clock. Two providers ship with the crate: [`RealtimeGraph`], which forwards
//! everything to the [`Engine`](crate::audio::Engine) running on the audio
//! thread, and [`RecordingGraph`], which keeps a log of every call and lets the
//! caller drive the clock by hand.

use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod automation;
pub mod realtime;
pub mod recording;

pub use automation::{Automation, Ramp, RAMP_STEPS_PER_SECOND};
pub use realtime::RealtimeGraph;
pub use recording::RecordingGraph;

/// Handle to a node inside a graph. `NodeId(0)` is always the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const DESTINATION: NodeId = NodeId(0);
}

/// The single automatable parameter a node exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Param {
    Gain,
    DelayTime,
    Frequency,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Gain { gain: f32 },
    /// `max_delay` is the longest delay time (seconds) the line can hold.
    Delay { max_delay: f64, delay_time: f32 },
    Oscillator { waveform: Waveform, frequency: f32 },
    WaveShaper { curve: Arc<[f32]> },
}

impl NodeKind {
    /// The parameter this kind of node exposes, with its initial value.
    pub fn param(&self) -> Option<(Param, f32)> {
        match self {
            NodeKind::Gain { gain } => Some((Param::Gain, *gain)),
            NodeKind::Delay { delay_time, .. } => Some((Param::DelayTime, *delay_time)),
            NodeKind::Oscillator { frequency, .. } => Some((Param::Frequency, *frequency)),
            NodeKind::WaveShaper { .. } => None,
        }
    }
}

/// Where an edge lands: a node's signal input, or one of its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Node(NodeId),
    Param(NodeId, Param),
}

/// Everything a graph provider can be asked to do. The realtime provider sends
/// these to the engine; the recording provider keeps them.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphCommand {
    Create { id: NodeId, kind: NodeKind },
    Connect { from: NodeId, to: Target },
    Disconnect { from: NodeId },
    SetParam { node: NodeId, param: Param, value: f32, at: f64 },
    CancelScheduled { node: NodeId, param: Param, from: f64 },
    Ramp { node: NodeId, param: Param, ramp: Ramp },
    SetCurve { node: NodeId, curve: Arc<[f32]> },
}

/// A monotonic clock in seconds.
pub trait Clock {
    fn current_time(&self) -> f64;
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn current_time(&self) -> f64 {
        (**self).current_time()
    }
}

/// Node creation, routing and parameter scheduling. All calls are
/// fire-and-forget; none of them block.
pub trait AudioGraph: Clock {
    fn create_node(&self, kind: NodeKind) -> NodeId;

    fn connect(&self, from: NodeId, to: NodeId);

    /// Adds `from`'s output to the scheduled value of `to`'s parameter.
    fn connect_param(&self, from: NodeId, to: NodeId, param: Param);

    /// Removes every outgoing edge of `from`.
    fn disconnect(&self, from: NodeId);

    fn set_param(&self, node: NodeId, param: Param, value: f32, at: f64);

    /// Drops every scheduled value of the parameter at or after `from`.
    fn cancel_scheduled(&self, node: NodeId, param: Param, from: f64);

    /// Schedules a whole ramp as one timeline event starting at `ramp.start`.
    fn ramp_param(&self, node: NodeId, param: Param, ramp: Ramp);

    fn set_curve(&self, node: NodeId, curve: Arc<[f32]>);

    fn destination(&self) -> NodeId {
        NodeId::DESTINATION
    }
}

/// Shared handle every effect and voice holds on the control thread.
pub type Graph = Rc<dyn AudioGraph>;
