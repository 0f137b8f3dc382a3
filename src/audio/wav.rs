use std::path::Path;

use super::engine::Engine;
use super::frame::StereoFrame;

/// Runs `tick` and then one block of `block_seconds` of audio, repeatedly,
/// until `seconds` of audio exist. This is the host loop without a device:
/// `tick` is where a caller polls its sequencer.
pub fn render_offline(
    engine: &mut Engine,
    seconds: f64,
    block_seconds: f64,
    mut tick: impl FnMut(),
) -> Vec<StereoFrame> {
    let sample_rate = engine.clock().sample_rate();
    let total = (seconds * sample_rate).round() as usize;
    let block = ((block_seconds * sample_rate).round() as usize).max(1);
    let mut out = vec![StereoFrame::zero(); total];
    for chunk in out.chunks_mut(block) {
        tick();
        engine.render_block(chunk);
    }
    out
}

pub fn write_wav(path: &Path, sample_rate: u32, frames: &[StereoFrame]) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for f in frames {
        writer.write_sample(f.left)?;
        writer.write_sample(f.right)?;
    }
    writer.finalize()?;
    Ok(())
}
