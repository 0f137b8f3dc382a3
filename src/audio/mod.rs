use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::graph::RealtimeGraph;

mod engine;
mod frame;
mod node;
mod wav;

pub use engine::Engine;
pub use frame::StereoFrame;
pub use node::{shape, DelayLine, Oscillator, Processor};
pub use wav::{render_offline, write_wav};

/// Keeps the output stream alive; dropping it stops playback.
pub struct AudioHandle {
    sample_rate: f64,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

/// Opens the default output device and starts an engine on its callback.
/// Returns the control-side graph that feeds that engine.
pub fn start_audio() -> anyhow::Result<(RealtimeGraph, AudioHandle)> {
    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    log::info!("cpal host: {}", host.id().name());
    log::info!("cpal device: {}", device.name().unwrap_or_else(|_| "(no name)".into()));

    let sample_rate = config.sample_rate().0 as f64;
    let channels = config.channels() as usize;

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let (graph, engine) = RealtimeGraph::new(sample_rate);
            let output_stream =
                build_output_stream_f32(&device, &config.into(), engine, channels)?;
            output_stream.play().context("failed to play output stream")?;
            Ok((
                graph,
                AudioHandle {
                    sample_rate,
                    _output_stream: output_stream,
                },
            ))
        }
        format => anyhow::bail!("unsupported sample format {format} (only f32 supported for now)"),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    // grows to the largest block the device asks for, then stays put
    let mut scratch: Vec<StereoFrame> = Vec::new();

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            let n_frames = data.len() / channels;
            scratch.resize(n_frames, StereoFrame::zero());
            engine.render_block(&mut scratch);
            for (out, frame) in data.chunks_exact_mut(channels).zip(scratch.iter()) {
                match out {
                    [mono] => *mono = frame.left,
                    [left, right, rest @ ..] => {
                        *left = frame.left;
                        *right = frame.right;
                        rest.fill(0.0);
                    }
                    [] => {}
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
