use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Sender, TrySendError};

use super::{AudioGraph, Clock, GraphCommand, NodeId, NodeKind, Param, Ramp, Target};
use crate::audio::Engine;

// a patch build sends a few hundred commands at once
const COMMAND_QUEUE_LEN: usize = 8192;

/// Frames rendered so far, advanced by the engine and read as the audio clock.
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    frames: Arc<AtomicU64>,
    sample_rate: f64,
}

impl FrameClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub(crate) fn add_frames(&self, n: u64) {
        self.frames.fetch_add(n, Ordering::Release);
    }
}

impl Clock for FrameClock {
    fn current_time(&self) -> f64 {
        self.frames() as f64 / self.sample_rate
    }
}

/// Control-thread side of the engine. Node ids are allocated here so callers
/// get them back immediately; the commands follow over the channel and are
/// applied at the start of the next audio block.
pub struct RealtimeGraph {
    tx: Sender<GraphCommand>,
    clock: FrameClock,
    next_id: Cell<u32>,
}

impl RealtimeGraph {
    /// Builds a connected graph/engine pair. Move the engine to whatever
    /// renders audio.
    pub fn new(sample_rate: f64) -> (Self, Engine) {
        let (tx, rx) = crossbeam_channel::bounded::<GraphCommand>(COMMAND_QUEUE_LEN);
        let clock = FrameClock::new(sample_rate);
        let engine = Engine::new(rx, clock.clone());
        let graph = Self {
            tx,
            clock,
            next_id: Cell::new(0),
        };
        (graph, engine)
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    fn send(&self, cmd: GraphCommand) {
        match self.tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                log::warn!("graph command queue full, dropping {cmd:?}");
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("audio engine is gone");
            }
        }
    }
}

impl Clock for RealtimeGraph {
    fn current_time(&self) -> f64 {
        self.clock.current_time()
    }
}

impl AudioGraph for RealtimeGraph {
    fn create_node(&self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.send(GraphCommand::Create { id, kind });
        id
    }

    fn connect(&self, from: NodeId, to: NodeId) {
        self.send(GraphCommand::Connect { from, to: Target::Node(to) });
    }

    fn connect_param(&self, from: NodeId, to: NodeId, param: Param) {
        self.send(GraphCommand::Connect { from, to: Target::Param(to, param) });
    }

    fn disconnect(&self, from: NodeId) {
        self.send(GraphCommand::Disconnect { from });
    }

    fn set_param(&self, node: NodeId, param: Param, value: f32, at: f64) {
        self.send(GraphCommand::SetParam { node, param, value, at });
    }

    fn cancel_scheduled(&self, node: NodeId, param: Param, from: f64) {
        self.send(GraphCommand::CancelScheduled { node, param, from });
    }

    fn ramp_param(&self, node: NodeId, param: Param, ramp: Ramp) {
        self.send(GraphCommand::Ramp { node, param, ramp });
    }

    fn set_curve(&self, node: NodeId, curve: Arc<[f32]>) {
        self.send(GraphCommand::SetCurve { node, curve });
    }
}
