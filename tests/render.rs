use std::rc::Rc;

use fxloop::audio::{render_offline, write_wav, StereoFrame};
use fxloop::effect::{Chorus, ChorusConfig, Drive, DriveConfig, Effect, EffectOptions, RingMod, RingModConfig};
use fxloop::graph::{AudioGraph, Graph, NodeId, NodeKind, RealtimeGraph, Waveform};
use fxloop::patch::Patch;
use fxloop::{GainChannel, Session};

const SR: f64 = 8000.0;

fn square(graph: &Graph) -> NodeId {
    graph.create_node(NodeKind::Oscillator {
        waveform: Waveform::Square,
        frequency: 100.0,
    })
}

fn to_destination() -> EffectOptions {
    EffectOptions {
        connect: Some(NodeId::DESTINATION),
        ..Default::default()
    }
}

fn peak(frames: &[StereoFrame]) -> f32 {
    frames.iter().map(StereoFrame::peak).fold(0.0, f32::max)
}

#[test]
fn fully_dry_drive_passes_the_source_untouched() {
    let (rt, mut engine) = RealtimeGraph::new(SR);
    let graph: Graph = Rc::new(rt);
    let mut drive = Drive::new(
        &graph,
        &DriveConfig {
            curve_len: 1024,
            options: to_destination(),
            ..Default::default()
        },
    )
    .unwrap();
    drive.set_dry(1.0).unwrap();
    // created after the effect it feeds
    let src = square(&graph);
    graph.connect(src, drive.input());

    let frames = render_offline(&mut engine, 0.05, 0.016, || {});
    for f in &frames {
        assert!((f.left.abs() - 1.0).abs() < 1e-6);
    }
}

#[test]
fn drive_output_stays_bounded() {
    let (rt, mut engine) = RealtimeGraph::new(SR);
    let graph: Graph = Rc::new(rt);
    let src = square(&graph);
    let drive = Drive::new(
        &graph,
        &DriveConfig {
            drive: 1.0,
            curve_len: 1024,
            options: to_destination(),
            ..Default::default()
        },
    )
    .unwrap();
    graph.connect(src, drive.input());

    let frames = render_offline(&mut engine, 0.05, 0.016, || {});
    let p = peak(&frames);
    assert!(p > 0.0);
    // fully wet: the shaper ceiling times unity make-up gain
    assert!(p <= 1.05 * 10f32.powf(0.05 * (21.0 - 27.0)) + 1e-4);
}

#[test]
fn chorus_makes_sound() {
    let (rt, mut engine) = RealtimeGraph::new(SR);
    let graph: Graph = Rc::new(rt);
    let src = square(&graph);
    let chorus = Chorus::new(
        &graph,
        &ChorusConfig {
            options: to_destination(),
            ..Default::default()
        },
    )
    .unwrap();
    graph.connect(src, chorus.input());

    let frames = render_offline(&mut engine, 0.2, 0.016, || {});
    // silent until the 30 ms delay has filled
    assert!(frames[..200].iter().all(|f| f.left == 0.0));
    assert!(peak(&frames[400..]) > 0.5);
}

#[test]
fn ring_mod_is_audible_until_disconnected() {
    let (rt, mut engine) = RealtimeGraph::new(SR);
    let graph: Graph = Rc::new(rt);
    let src = square(&graph);
    let rm = RingMod::new(
        &graph,
        &RingModConfig {
            frequency: 10.0,
            options: to_destination(),
            ..Default::default()
        },
    )
    .unwrap();
    graph.connect(src, rm.input());
    let frames = render_offline(&mut engine, 0.05, 0.016, || {});
    let p = peak(&frames);
    assert!(p > 0.5 && p <= 1.0);

    rm.disconnect();
    let frames = render_offline(&mut engine, 0.05, 0.016, || {});
    assert_eq!(peak(&frames), 0.0);
}

#[test]
fn default_patch_renders_to_a_file() {
    let (rt, mut engine) = RealtimeGraph::new(SR);
    let graph: Graph = Rc::new(rt);
    let patch = Patch {
        seconds: 1.0,
        ..Default::default()
    };
    let mut session = Session::build(&graph, &patch).unwrap();
    assert_eq!(session.voices().len(), 3);
    assert_eq!(session.chain.len(), 2);

    session.sequencer.play();
    let frames = render_offline(&mut engine, patch.seconds, 0.016, || session.sequencer.update());
    assert_eq!(frames.len(), SR as usize);
    assert!(peak(&frames) > 0.01);
    assert!(session.sequencer.current_step() > 0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("default.wav");
    write_wav(&path, SR as u32, &frames).unwrap();
    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.len() as usize, frames.len() * 2);
}

fn dc(graph: &Graph) -> NodeId {
    graph.create_node(NodeKind::Oscillator {
        waveform: Waveform::Square,
        frequency: 0.0,
    })
}

#[test]
fn half_dry_mix_keeps_both_paths_in_step() {
    let (rt, mut engine) = RealtimeGraph::new(SR);
    let graph: Graph = Rc::new(rt);
    let src = graph.create_node(NodeKind::Oscillator {
        waveform: Waveform::Sawtooth,
        frequency: 100.0,
    });
    let mut drive = Drive::new(
        &graph,
        &DriveConfig {
            curve_len: 1024,
            options: to_destination(),
            ..Default::default()
        },
    )
    .unwrap();
    // threshold far above the signal: the curve is the identity
    drive.set_threshold(0.0).unwrap();
    drive.set_headroom(20.0).unwrap();
    drive.rebuild_curve();
    drive.set_drive(1.0).unwrap();
    drive.set_dry(0.5).unwrap();
    graph.connect(src, drive.input());

    let (reference, mut ref_engine) = RealtimeGraph::new(SR);
    let ref_src = reference.create_node(NodeKind::Oscillator {
        waveform: Waveform::Sawtooth,
        frequency: 100.0,
    });
    reference.connect(ref_src, reference.destination());

    let got = render_offline(&mut engine, 0.02, 0.016, || {});
    let want = render_offline(&mut ref_engine, 0.02, 0.016, || {});
    for (i, (g, w)) in got.iter().zip(&want).enumerate() {
        assert!((g.left - w.left).abs() < 2e-3, "frame {i}: {} != {}", g.left, w.left);
    }
}

#[test]
fn ramp_longer_than_the_command_queue_still_lands() {
    // 150 s at 60 steps per second is far more steps than the queue holds
    let (rt, mut engine) = RealtimeGraph::new(100.0);
    let graph: Graph = Rc::new(rt);
    let src = dc(&graph);
    let mut ch = GainChannel::new(&graph, 0.0);
    graph.connect(src, ch.node());
    graph.connect(ch.node(), graph.destination());
    ch.set_level(1.0, 150.0).unwrap();

    let frames = render_offline(&mut engine, 200.0, 0.016, || {});
    let mid = frames[7500].left;
    assert!(mid > 0.0 && mid < 1.0);
    assert_eq!(frames[frames.len() - 1].left, 1.0);
}

#[test]
fn long_mix_ramp_ends_fully_dry() {
    let (rt, mut engine) = RealtimeGraph::new(100.0);
    let graph: Graph = Rc::new(rt);
    let mut drive = Drive::new(
        &graph,
        &DriveConfig {
            curve_len: 1024,
            options: to_destination(),
            ..Default::default()
        },
    )
    .unwrap();
    let src = dc(&graph);
    graph.connect(src, drive.input());
    drive.set_dry_gain(1.0, 150.0).unwrap();

    let frames = render_offline(&mut engine, 200.0, 0.016, || {});
    assert_eq!(drive.dry(), 1.0);
    assert_eq!(frames[frames.len() - 1].left, 1.0);
}

#[test]
fn drive_with_no_headroom_renders_finite_samples() {
    let (rt, mut engine) = RealtimeGraph::new(SR);
    let graph: Graph = Rc::new(rt);
    let src = square(&graph);
    let drive = Drive::new(
        &graph,
        &DriveConfig {
            headroom: -20.0 * 1.05f32.log10(),
            curve_len: 1024,
            options: to_destination(),
            ..Default::default()
        },
    )
    .unwrap();
    graph.connect(src, drive.input());

    let frames = render_offline(&mut engine, 0.05, 0.016, || {});
    assert!(frames.iter().all(|f| f.left.is_finite()));
    assert!(peak(&frames) > 0.0);
}
