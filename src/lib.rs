//! Effects chain and look-ahead sequencer over a small audio graph.
//!
//! Effects and the sequencer talk to an [`AudioGraph`](graph::AudioGraph):
//! [`RecordingGraph`](graph::RecordingGraph) for tests,
//! [`RealtimeGraph`](graph::RealtimeGraph) in front of the audio engine.

pub mod audio;
pub mod curve;
pub mod effect;
pub mod error;
pub mod gain;
pub mod graph;
pub mod patch;
pub mod sequencer;
pub mod session;
pub mod voice;

pub use effect::{Effect, EffectChain, EffectLoop, EffectSpec};
pub use error::{Error, Result};
pub use gain::GainChannel;
pub use graph::{AudioGraph, Clock, Graph, NodeId};
pub use patch::Patch;
pub use sequencer::{Sequencer, SequencerConfig, Subdivision};
pub use session::Session;
