use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use super::{AudioGraph, Automation, Clock, GraphCommand, NodeId, NodeKind, Param, Ramp, Target};

/// A graph provider with no audio behind it.
///
/// Every call is kept in order, the node table and parameter timelines are
/// maintained, and the clock only moves when the owner says so. Useful for
/// driving effects and the sequencer deterministically.
#[derive(Default)]
pub struct RecordingGraph {
    inner: RefCell<Recorded>,
}

#[derive(Default)]
struct Recorded {
    time: f64,
    next_id: u32,
    commands: Vec<GraphCommand>,
    nodes: HashMap<NodeId, NodeKind>,
    edges: Vec<(NodeId, Target)>,
    params: HashMap<(NodeId, Param), Automation>,
}

impl RecordingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        self.inner.borrow_mut().time += seconds;
    }

    pub fn set_time(&self, time: f64) {
        self.inner.borrow_mut().time = time;
    }

    pub fn commands(&self) -> Vec<GraphCommand> {
        self.inner.borrow().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.inner.borrow_mut().commands.clear();
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.inner.borrow().nodes.get(&node).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    pub fn edges_from(&self, node: NodeId) -> Vec<Target> {
        self.inner
            .borrow()
            .edges
            .iter()
            .filter(|(from, _)| *from == node)
            .map(|(_, to)| *to)
            .collect()
    }

    pub fn is_connected(&self, from: NodeId, to: Target) -> bool {
        self.inner.borrow().edges.contains(&(from, to))
    }

    pub fn edge_count(&self) -> usize {
        self.inner.borrow().edges.len()
    }

    /// Scheduled value of a parameter at the current time.
    pub fn param_value(&self, node: NodeId, param: Param) -> Option<f32> {
        let t = self.current_time();
        self.param_value_at(node, param, t)
    }

    pub fn param_value_at(&self, node: NodeId, param: Param, t: f64) -> Option<f32> {
        self.inner
            .borrow()
            .params
            .get(&(node, param))
            .map(|a| a.value_at(t))
    }

    pub fn curve(&self, node: NodeId) -> Option<Arc<[f32]>> {
        match self.kind(node)? {
            NodeKind::WaveShaper { curve } => Some(curve),
            _ => None,
        }
    }

    fn record(&self, cmd: GraphCommand) {
        let mut inner = self.inner.borrow_mut();
        match &cmd {
            GraphCommand::Create { id, kind } => {
                if let Some((param, value)) = kind.param() {
                    inner.params.insert((*id, param), Automation::new(value));
                }
                inner.nodes.insert(*id, kind.clone());
            }
            GraphCommand::Connect { from, to } => inner.edges.push((*from, *to)),
            GraphCommand::Disconnect { from } => inner.edges.retain(|(f, _)| f != from),
            GraphCommand::SetParam { node, param, value, at } => {
                match inner.params.get_mut(&(*node, *param)) {
                    Some(a) => a.set_at(*at, *value),
                    None => log::warn!("{node:?} has no {param:?} parameter"),
                }
            }
            GraphCommand::CancelScheduled { node, param, from } => {
                if let Some(a) = inner.params.get_mut(&(*node, *param)) {
                    a.cancel_from(*from);
                }
            }
            GraphCommand::Ramp { node, param, ramp } => {
                match inner.params.get_mut(&(*node, *param)) {
                    Some(a) => a.ramp(*ramp),
                    None => log::warn!("{node:?} has no {param:?} parameter"),
                }
            }
            GraphCommand::SetCurve { node, curve } => {
                if let Some(NodeKind::WaveShaper { curve: c }) = inner.nodes.get_mut(node) {
                    *c = curve.clone();
                }
            }
        }
        inner.commands.push(cmd);
    }
}

impl Clock for RecordingGraph {
    fn current_time(&self) -> f64 {
        self.inner.borrow().time
    }
}

impl AudioGraph for RecordingGraph {
    fn create_node(&self, kind: NodeKind) -> NodeId {
        let id = {
            let mut inner = self.inner.borrow_mut();
            inner.next_id += 1;
            NodeId(inner.next_id)
        };
        self.record(GraphCommand::Create { id, kind });
        id
    }

    fn connect(&self, from: NodeId, to: NodeId) {
        self.record(GraphCommand::Connect { from, to: Target::Node(to) });
    }

    fn connect_param(&self, from: NodeId, to: NodeId, param: Param) {
        self.record(GraphCommand::Connect { from, to: Target::Param(to, param) });
    }

    fn disconnect(&self, from: NodeId) {
        self.record(GraphCommand::Disconnect { from });
    }

    fn set_param(&self, node: NodeId, param: Param, value: f32, at: f64) {
        self.record(GraphCommand::SetParam { node, param, value, at });
    }

    fn cancel_scheduled(&self, node: NodeId, param: Param, from: f64) {
        self.record(GraphCommand::CancelScheduled { node, param, from });
    }

    fn ramp_param(&self, node: NodeId, param: Param, ramp: Ramp) {
        self.record(GraphCommand::Ramp { node, param, ramp });
    }

    fn set_curve(&self, node: NodeId, curve: Arc<[f32]>) {
        self.record(GraphCommand::SetCurve { node, curve });
    }
}
