//! A gain stage whose level can jump or glide to a new value.
//!
//! A ramp of `d` seconds is sent to the graph as one [`Ramp`] event. It moves
//! in `ceil(d * 60)` steps, each closing a fixed fraction of the remaining
//! distance, with the last one landing exactly on the target. The same step
//! function answers [`GainChannel::level`], so a reader mid-ramp sees what the
//! audio thread is playing.

use crate::error::{check, check_f64, Result};
use crate::graph::{Graph, NodeId, NodeKind, Param, Ramp};

pub struct GainChannel {
    graph: Graph,
    node: NodeId,
    ramp: Ramp,
}

impl GainChannel {
    pub fn new(graph: &Graph, level: f32) -> Self {
        let node = graph.create_node(NodeKind::Gain { gain: level });
        Self {
            graph: graph.clone(),
            node,
            ramp: Ramp::immediate(level, graph.current_time()),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Current level, which mid-ramp is not yet the target.
    pub fn level(&self) -> f32 {
        self.ramp.level_at(self.graph.current_time())
    }

    pub fn target(&self) -> f32 {
        self.ramp.to
    }

    /// Moves to `value` immediately when `ramp_seconds` is zero (or negative),
    /// otherwise glides there over `ramp_seconds`. Replaces any ramp in flight.
    pub fn set_level(&mut self, value: f32, ramp_seconds: f64) -> Result<()> {
        let value = check("level", value)?;
        let ramp_seconds = check_f64("ramp", ramp_seconds)?;
        let now = self.graph.current_time();
        let from = self.level();

        self.graph.cancel_scheduled(self.node, Param::Gain, now);
        if ramp_seconds <= 0.0 {
            self.ramp = Ramp::immediate(value, now);
            self.graph.set_param(self.node, Param::Gain, value, now);
            return Ok(());
        }

        self.ramp = Ramp {
            from,
            to: value,
            start: now,
            duration: ramp_seconds,
        };
        self.graph.ramp_param(self.node, Param::Gain, self.ramp);
        Ok(())
    }
}
