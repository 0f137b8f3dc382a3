use crossbeam_channel::Receiver;

use super::frame::StereoFrame;
use super::node::Processor;
use crate::graph::realtime::FrameClock;
use crate::graph::{Automation, Clock, GraphCommand, NodeId, Param, Target};

struct EngineNode {
    processor: Processor,
    inputs: Vec<NodeId>,
    param_inputs: Vec<NodeId>,
    param: Option<(Param, Automation)>,
}

impl EngineNode {
    fn destination() -> Self {
        Self {
            processor: Processor::Sum,
            inputs: Vec::new(),
            param_inputs: Vec::new(),
            param: None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unseen,
    Open,
    Done,
}

/// Renders the node graph on the audio thread.
///
/// Every node runs after the nodes feeding it, whatever order they were
/// created in. Inside a cycle (a feedback loop, say) the edge that closes it
/// reads the previous frame.
pub struct Engine {
    rx: Receiver<GraphCommand>,
    clock: FrameClock,
    sample_rate: f32,
    nodes: Vec<Option<EngineNode>>,
    outputs: Vec<f32>,
    order: Vec<usize>,
    marks: Vec<Mark>,
    topology_changed: bool,
}

impl Engine {
    pub fn new(rx: Receiver<GraphCommand>, clock: FrameClock) -> Self {
        Self {
            rx,
            sample_rate: clock.sample_rate() as f32,
            clock,
            nodes: vec![Some(EngineNode::destination())],
            outputs: vec![0.0],
            order: vec![0],
            marks: Vec::new(),
            topology_changed: false,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn drain_commands(&mut self) {
        while let Ok(cmd) = self.rx.try_recv() {
            self.handle_cmd(cmd);
        }
    }

    pub fn handle_cmd(&mut self, cmd: GraphCommand) {
        if matches!(
            cmd,
            GraphCommand::Create { .. } | GraphCommand::Connect { .. } | GraphCommand::Disconnect { .. }
        ) {
            self.topology_changed = true;
        }
        match cmd {
            GraphCommand::Create { id, kind } => {
                let idx = id.0 as usize;
                if idx >= self.nodes.len() {
                    self.nodes.resize_with(idx + 1, || None);
                    self.outputs.resize(idx + 1, 0.0);
                }
                self.nodes[idx] = Some(EngineNode {
                    processor: Processor::from_kind(&kind, self.sample_rate),
                    inputs: Vec::new(),
                    param_inputs: Vec::new(),
                    param: kind.param().map(|(p, v)| (p, Automation::new(v))),
                });
            }
            GraphCommand::Connect { from, to } => {
                if self.node(from).is_none() {
                    log::warn!("connect from unknown node {from:?}");
                    return;
                }
                match to {
                    Target::Node(id) => match self.node_mut(id) {
                        Some(n) => n.inputs.push(from),
                        None => log::warn!("connect to unknown node {id:?}"),
                    },
                    Target::Param(id, param) => match self.node_mut(id) {
                        Some(n) if n.param.as_ref().is_some_and(|(p, _)| *p == param) => {
                            n.param_inputs.push(from)
                        }
                        _ => log::warn!("{id:?} has no {param:?} parameter"),
                    },
                }
            }
            GraphCommand::Disconnect { from } => {
                for n in self.nodes.iter_mut().flatten() {
                    n.inputs.retain(|i| *i != from);
                    n.param_inputs.retain(|i| *i != from);
                }
            }
            GraphCommand::SetParam { node, param, value, at } => {
                match self.automation(node, param) {
                    Some(a) => a.set_at(at, value),
                    None => log::warn!("{node:?} has no {param:?} parameter"),
                }
            }
            GraphCommand::CancelScheduled { node, param, from } => {
                if let Some(a) = self.automation(node, param) {
                    a.cancel_from(from);
                }
            }
            GraphCommand::Ramp { node, param, ramp } => match self.automation(node, param) {
                Some(a) => a.ramp(ramp),
                None => log::warn!("{node:?} has no {param:?} parameter"),
            },
            GraphCommand::SetCurve { node, curve } => match self.node_mut(node) {
                Some(EngineNode { processor: Processor::WaveShaper(c), .. }) => *c = curve,
                _ => log::warn!("{node:?} is not a wave shaper"),
            },
        }
    }

    fn node(&self, id: NodeId) -> Option<&EngineNode> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut EngineNode> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    fn automation(&mut self, id: NodeId, param: Param) -> Option<&mut Automation> {
        match self.node_mut(id)?.param.as_mut() {
            Some((p, a)) if *p == param => Some(a),
            _ => None,
        }
    }

    fn sum(outputs: &[f32], ids: &[NodeId]) -> f32 {
        ids.iter().map(|i| outputs[i.0 as usize]).sum()
    }

    /// Depth-first from the destination, then from every other node, so each
    /// node lands after its inputs. An edge back to a node still open is the
    /// one that reads the previous frame.
    fn sort_nodes(&mut self) {
        self.order.clear();
        self.marks.clear();
        self.marks.resize(self.nodes.len(), Mark::Unseen);
        for idx in std::iter::once(0).chain(1..self.nodes.len()) {
            Self::visit(&self.nodes, idx, &mut self.marks, &mut self.order);
        }
        self.topology_changed = false;
    }

    fn visit(nodes: &[Option<EngineNode>], idx: usize, marks: &mut [Mark], order: &mut Vec<usize>) {
        if marks[idx] != Mark::Unseen {
            return;
        }
        let Some(node) = nodes[idx].as_ref() else {
            marks[idx] = Mark::Done;
            return;
        };
        marks[idx] = Mark::Open;
        for dep in node.inputs.iter().chain(&node.param_inputs) {
            let dep = dep.0 as usize;
            if dep < nodes.len() {
                Self::visit(nodes, dep, marks, order);
            }
        }
        marks[idx] = Mark::Done;
        order.push(idx);
    }

    fn next_sample(&mut self, time: f64) -> f32 {
        let sample_rate = self.sample_rate;
        for &idx in &self.order {
            let Some(node) = self.nodes[idx].as_mut() else {
                continue;
            };
            let input = Self::sum(&self.outputs, &node.inputs);
            let param = match node.param.as_mut() {
                Some((_, a)) => a.advance(time) + Self::sum(&self.outputs, &node.param_inputs),
                None => 0.0,
            };
            self.outputs[idx] = node.processor.process(input, param, sample_rate);
        }
        self.outputs[0]
    }

    /// Applies pending commands, then fills `frames` and advances the clock.
    pub fn render_block(&mut self, frames: &mut [StereoFrame]) {
        self.drain_commands();
        if self.topology_changed {
            self.sort_nodes();
        }
        let start = self.clock.current_time();
        let dt = 1.0 / self.clock.sample_rate();
        for (i, frame) in frames.iter_mut().enumerate() {
            *frame = StereoFrame::mono(self.next_sample(start + i as f64 * dt));
        }
        self.clock.add_frames(frames.len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AudioGraph, NodeKind, Ramp, RealtimeGraph};

    fn render(engine: &mut Engine, n: usize) -> Vec<f32> {
        let mut frames = vec![StereoFrame::zero(); n];
        engine.render_block(&mut frames);
        frames.iter().map(|f| f.left).collect()
    }

    #[test]
    fn silent_until_something_is_connected() {
        let (graph, mut engine) = RealtimeGraph::new(1000.0);
        graph.create_node(NodeKind::Oscillator {
            waveform: crate::graph::Waveform::Square,
            frequency: 10.0,
        });
        assert!(render(&mut engine, 16).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn gain_scales_a_source_into_the_destination() {
        let (graph, mut engine) = RealtimeGraph::new(1000.0);
        let osc = graph.create_node(NodeKind::Oscillator {
            waveform: crate::graph::Waveform::Square,
            frequency: 10.0,
        });
        let gain = graph.create_node(NodeKind::Gain { gain: 0.25 });
        graph.connect(osc, gain);
        graph.connect(gain, graph.destination());
        let out = render(&mut engine, 4);
        assert_eq!(out, vec![0.25; 4]);
    }

    #[test]
    fn scheduled_values_apply_at_their_time() {
        let (graph, mut engine) = RealtimeGraph::new(1000.0);
        let osc = graph.create_node(NodeKind::Oscillator {
            waveform: crate::graph::Waveform::Square,
            frequency: 1.0,
        });
        let gain = graph.create_node(NodeKind::Gain { gain: 0.0 });
        graph.connect(osc, gain);
        graph.connect(gain, graph.destination());
        graph.set_param(gain, Param::Gain, 1.0, 0.005);
        let out = render(&mut engine, 10);
        assert_eq!(&out[..5], &[0.0; 5]);
        assert_eq!(&out[5..], &[1.0; 5]);
        assert!((engine.clock().current_time() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn modulation_adds_to_the_parameter() {
        let (graph, mut engine) = RealtimeGraph::new(1000.0);
        let dc = graph.create_node(NodeKind::Oscillator {
            waveform: crate::graph::Waveform::Square,
            frequency: 0.0,
        });
        let lfo_depth = graph.create_node(NodeKind::Gain { gain: 0.5 });
        let gain = graph.create_node(NodeKind::Gain { gain: 0.0 });
        graph.connect(dc, gain);
        graph.connect(dc, lfo_depth);
        graph.connect_param(lfo_depth, gain, Param::Gain);
        graph.connect(gain, graph.destination());
        let out = render(&mut engine, 3);
        assert_eq!(out, vec![0.5; 3]);
    }

    #[test]
    fn modulator_created_after_its_target_is_not_late() {
        let (graph, mut engine) = RealtimeGraph::new(1000.0);
        let dc = graph.create_node(NodeKind::Oscillator {
            waveform: crate::graph::Waveform::Square,
            frequency: 0.0,
        });
        let gain = graph.create_node(NodeKind::Gain { gain: 0.0 });
        let depth = graph.create_node(NodeKind::Gain { gain: 0.5 });
        graph.connect(dc, gain);
        graph.connect(dc, depth);
        graph.connect_param(depth, gain, Param::Gain);
        graph.connect(gain, graph.destination());
        assert_eq!(render(&mut engine, 3), vec![0.5; 3]);
    }

    fn sawtooth(graph: &RealtimeGraph) -> NodeId {
        graph.create_node(NodeKind::Oscillator {
            waveform: crate::graph::Waveform::Sawtooth,
            frequency: 100.0,
        })
    }

    #[test]
    fn parallel_paths_stay_sample_aligned() {
        let (reference, mut ref_engine) = RealtimeGraph::new(1000.0);
        let src = sawtooth(&reference);
        reference.connect(src, reference.destination());
        let expected = render(&mut ref_engine, 40);

        // the stage exists before the node that feeds it
        let (graph, mut engine) = RealtimeGraph::new(1000.0);
        let src = sawtooth(&graph);
        let stage = graph.create_node(NodeKind::Gain { gain: 1.0 });
        let input = graph.create_node(NodeKind::Gain { gain: 1.0 });
        let dry = graph.create_node(NodeKind::Gain { gain: 0.5 });
        let wet = graph.create_node(NodeKind::Gain { gain: 0.5 });
        graph.connect(src, input);
        graph.connect(input, dry);
        graph.connect(input, stage);
        graph.connect(stage, wet);
        graph.connect(dry, graph.destination());
        graph.connect(wet, graph.destination());
        let out = render(&mut engine, 40);

        assert!(expected.iter().any(|s| *s != expected[0]));
        for (i, (got, want)) in out.iter().zip(&expected).enumerate() {
            assert!((got - want).abs() < 1e-6, "frame {i}: {got} != {want}");
        }
    }

    #[test]
    fn feedback_cycle_reads_the_previous_frame() {
        let (graph, mut engine) = RealtimeGraph::new(1000.0);
        let impulse = graph.create_node(NodeKind::Gain { gain: 1.0 });
        let dc = graph.create_node(NodeKind::Oscillator {
            waveform: crate::graph::Waveform::Square,
            frequency: 0.0,
        });
        let sum = graph.create_node(NodeKind::Gain { gain: 1.0 });
        let fb = graph.create_node(NodeKind::Gain { gain: 0.5 });
        graph.connect(dc, impulse);
        graph.connect(impulse, sum);
        graph.connect(sum, fb);
        graph.connect(fb, sum);
        graph.connect(sum, graph.destination());
        // one frame of input, then only the loop
        graph.set_param(impulse, Param::Gain, 0.0, 0.001);
        assert_eq!(render(&mut engine, 4), vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn ramp_command_runs_on_the_timeline() {
        let (graph, mut engine) = RealtimeGraph::new(1000.0);
        let dc = graph.create_node(NodeKind::Oscillator {
            waveform: crate::graph::Waveform::Square,
            frequency: 0.0,
        });
        let gain = graph.create_node(NodeKind::Gain { gain: 0.0 });
        graph.connect(dc, gain);
        graph.connect(gain, graph.destination());
        let ramp = Ramp { from: 0.0, to: 1.0, start: 0.0, duration: 0.1 };
        graph.ramp_param(gain, Param::Gain, ramp);
        let out = render(&mut engine, 120);
        for (i, s) in out.iter().enumerate() {
            assert_eq!(*s, ramp.level_at(i as f64 / 1000.0), "frame {i}");
        }
        assert_eq!(out[119], 1.0);
    }

    #[test]
    fn disconnect_silences_the_path() {
        let (graph, mut engine) = RealtimeGraph::new(1000.0);
        let osc = graph.create_node(NodeKind::Oscillator {
            waveform: crate::graph::Waveform::Square,
            frequency: 1.0,
        });
        graph.connect(osc, graph.destination());
        assert_eq!(render(&mut engine, 2), vec![1.0, 1.0]);
        graph.disconnect(osc);
        assert_eq!(render(&mut engine, 2), vec![0.0, 0.0]);
    }
}
