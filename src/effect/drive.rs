use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_config, Effect, EffectLoop, EffectOptions, EffectStage};
use crate::curve;
use crate::error::{check, Error, Result};
use crate::graph::{Graph, NodeId, NodeKind, Param};

/// Lowest drive that reaches the graph; keeps the make-up gain finite.
pub const MIN_DRIVE: f32 = 0.01;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub drive: f32,
    /// Knee threshold in dB.
    pub threshold: f32,
    /// Headroom above the threshold in dB.
    pub headroom: f32,
    pub curve_len: usize,
    #[serde(flatten)]
    pub options: EffectOptions,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            drive: 0.5,
            threshold: -27.0,
            headroom: 21.0,
            curve_len: curve::DEFAULT_CURVE_LEN,
            options: EffectOptions::default(),
        }
    }
}

impl DriveConfig {
    pub fn from_json(config: Option<&Value>) -> Result<Self> {
        parse_config(config)
    }
}

fn makeup_gain(drive: f32) -> f32 {
    (1.0 / drive).powf(0.6)
}

/// Pre-gain into a soft-knee wave shaper, then make-up gain so louder drive
/// settings don't simply get louder.
///
/// The curve is built once at construction. Changing `threshold` or
/// `headroom` only takes effect after [`Drive::rebuild_curve`].
pub struct Drive {
    fx: EffectLoop,
    graph: Graph,
    pre_gain: NodeId,
    shaper: NodeId,
    post_gain: NodeId,
    drive: f32,
    threshold: f32,
    headroom: f32,
    curve_len: usize,
}

impl Drive {
    pub fn new(graph: &Graph, config: &DriveConfig) -> Result<Self> {
        let drive = check("drive", config.drive)?.max(MIN_DRIVE);
        let threshold = check("threshold", config.threshold)?;
        let headroom = check("headroom", config.headroom)?;
        if config.curve_len < 2 || config.curve_len % 2 != 0 {
            return Err(Error::InvalidConfig(format!(
                "curve_len must be even and at least 2, got {}",
                config.curve_len
            )));
        }

        let curve: Arc<[f32]> = curve::generate(threshold, headroom, config.curve_len).into();
        let pre_gain = graph.create_node(NodeKind::Gain { gain: drive });
        let shaper = graph.create_node(NodeKind::WaveShaper { curve });
        let post_gain = graph.create_node(NodeKind::Gain { gain: makeup_gain(drive) });
        graph.connect(pre_gain, shaper);
        graph.connect(shaper, post_gain);

        let stage = EffectStage { entry: pre_gain, exit: post_gain };
        let fx = EffectLoop::new(graph, stage, &config.options)?;
        log::debug!("drive: drive={drive} threshold={threshold}dB headroom={headroom}dB");
        Ok(Self {
            fx,
            graph: graph.clone(),
            pre_gain,
            shaper,
            post_gain,
            drive,
            threshold,
            headroom,
            curve_len: config.curve_len,
        })
    }

    /// The effective drive, never below [`MIN_DRIVE`].
    pub fn drive(&self) -> f32 {
        self.drive
    }

    pub fn set_drive(&mut self, value: f32) -> Result<()> {
        self.drive = check("drive", value)?.max(MIN_DRIVE);
        let now = self.graph.current_time();
        self.graph.set_param(self.pre_gain, Param::Gain, self.drive, now);
        self.graph
            .set_param(self.post_gain, Param::Gain, makeup_gain(self.drive), now);
        Ok(())
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, value: f32) -> Result<()> {
        self.threshold = check("threshold", value)?;
        Ok(())
    }

    pub fn headroom(&self) -> f32 {
        self.headroom
    }

    pub fn set_headroom(&mut self, value: f32) -> Result<()> {
        self.headroom = check("headroom", value)?;
        Ok(())
    }

    /// Regenerates the shaping curve from the current threshold and headroom.
    pub fn rebuild_curve(&mut self) {
        let curve: Arc<[f32]> = curve::generate(self.threshold, self.headroom, self.curve_len).into();
        self.graph.set_curve(self.shaper, curve);
    }
}

impl Effect for Drive {
    fn name(&self) -> &'static str {
        "drive"
    }

    fn effect_loop(&self) -> &EffectLoop {
        &self.fx
    }

    fn effect_loop_mut(&mut self) -> &mut EffectLoop {
        &mut self.fx
    }

    fn stage_nodes(&self) -> Vec<NodeId> {
        vec![self.pre_gain, self.shaper, self.post_gain]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RecordingGraph;
    use std::rc::Rc;

    fn setup() -> (Rc<RecordingGraph>, Drive) {
        let rec = Rc::new(RecordingGraph::new());
        let graph: Graph = rec.clone();
        let config = DriveConfig {
            curve_len: 256,
            ..Default::default()
        };
        let drive = Drive::new(&graph, &config).unwrap();
        (rec, drive)
    }

    #[test]
    fn default_gains() {
        let (rec, drive) = setup();
        assert_eq!(drive.drive(), 0.5);
        assert_eq!(rec.param_value(drive.pre_gain, Param::Gain), Some(0.5));
        assert_eq!(rec.param_value(drive.post_gain, Param::Gain), Some(2f32.powf(0.6)));
    }

    #[test]
    fn drive_is_floored() {
        let (rec, mut drive) = setup();
        for v in [0.0, -1.0, 0.001] {
            drive.set_drive(v).unwrap();
            assert_eq!(drive.drive(), MIN_DRIVE);
            assert_eq!(rec.param_value(drive.pre_gain, Param::Gain), Some(0.01));
            assert_eq!(
                rec.param_value(drive.post_gain, Param::Gain),
                Some((1.0f32 / 0.01).powf(0.6))
            );
        }
    }

    #[test]
    fn threshold_changes_wait_for_rebuild() {
        let (rec, mut drive) = setup();
        let before = rec.curve(drive.shaper).unwrap();
        drive.set_threshold(-6.0).unwrap();
        drive.set_headroom(3.0).unwrap();
        assert_eq!(rec.curve(drive.shaper).unwrap(), before);
        drive.rebuild_curve();
        let after = rec.curve(drive.shaper).unwrap();
        assert_ne!(after, before);
        assert_eq!(&after[..], &curve::generate(-6.0, 3.0, 256)[..]);
    }

    #[test]
    fn headroom_without_room_still_builds_a_clean_curve() {
        let (rec, mut drive) = setup();
        drive.set_threshold(-6.0).unwrap();
        drive.set_headroom(-20.0 * 1.05f32.log10()).unwrap();
        drive.rebuild_curve();
        let curve = rec.curve(drive.shaper).unwrap();
        assert!(curve.iter().all(|v| v.is_finite()));
        let ceiling = curve::db_to_linear(-6.0) * 1.0001;
        assert!(curve.iter().all(|v| v.abs() <= ceiling));
    }

    #[test]
    fn odd_curve_length_is_refused() {
        let rec = Rc::new(RecordingGraph::new());
        let graph: Graph = rec.clone();
        let config = DriveConfig {
            curve_len: 255,
            ..Default::default()
        };
        assert!(matches!(Drive::new(&graph, &config), Err(Error::InvalidConfig(_))));
    }
}
