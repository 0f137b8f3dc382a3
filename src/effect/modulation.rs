use crate::error::{check, Result};
use crate::graph::{Graph, NodeId, NodeKind, Param, Waveform};

const MAX_DELAY_SECONDS: f64 = 1.0;

/// A delay line whose delay time is swept by an LFO through a depth gain:
/// `lfo -> depth -> delay.delay_time`. Chorus and flanger both sit on this.
pub(crate) struct ModulatedDelay {
    graph: Graph,
    lfo: NodeId,
    depth_gain: NodeId,
    delay_line: NodeId,
    speed: f32,
    delay: f32,
    depth: f32,
}

impl ModulatedDelay {
    pub fn new(graph: &Graph, speed: f32, delay: f32, depth: f32) -> Result<Self> {
        let speed = check("speed", speed)?;
        let delay = check("delay", delay)?;
        let depth = check("depth", depth)?;

        let delay_line = graph.create_node(NodeKind::Delay {
            max_delay: MAX_DELAY_SECONDS,
            delay_time: delay,
        });
        let lfo = graph.create_node(NodeKind::Oscillator {
            waveform: Waveform::Sine,
            frequency: speed,
        });
        let depth_gain = graph.create_node(NodeKind::Gain { gain: depth });
        graph.connect(lfo, depth_gain);
        graph.connect_param(depth_gain, delay_line, Param::DelayTime);

        Ok(Self {
            graph: graph.clone(),
            lfo,
            depth_gain,
            delay_line,
            speed,
            delay,
            depth,
        })
    }

    pub fn delay_line(&self) -> NodeId {
        self.delay_line
    }

    pub fn nodes(&self) -> [NodeId; 3] {
        [self.delay_line, self.lfo, self.depth_gain]
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn delay(&self) -> f32 {
        self.delay
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn set_speed(&mut self, value: f32) -> Result<()> {
        self.speed = check("speed", value)?;
        self.write(self.lfo, Param::Frequency, self.speed);
        Ok(())
    }

    pub fn set_delay(&mut self, value: f32) -> Result<()> {
        self.delay = check("delay", value)?;
        self.write(self.delay_line, Param::DelayTime, self.delay);
        Ok(())
    }

    pub fn set_depth(&mut self, value: f32) -> Result<()> {
        self.depth = check("depth", value)?;
        self.write(self.depth_gain, Param::Gain, self.depth);
        Ok(())
    }

    fn write(&self, node: NodeId, param: Param, value: f32) {
        log::debug!("{node:?} {param:?} <- {value}");
        self.graph.set_param(node, param, value, self.graph.current_time());
    }
}
