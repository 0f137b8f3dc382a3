use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use clap::Parser;
use fxloop::audio;
use fxloop::graph::{Graph, RealtimeGraph};
use fxloop::patch::{self, Patch};
use fxloop::Session;

/// Plays a patch through the default output device, or renders it to a WAV file.
#[derive(Parser, Debug)]
struct Args {
    /// Patch file (JSON). The built-in patch when omitted.
    patch: Option<PathBuf>,
    /// Write a 32-bit float WAV here instead of playing.
    #[arg(long)]
    render: Option<PathBuf>,
    /// Sample rate used with --render.
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let patch = match &args.patch {
        Some(path) => patch::load_patch(path)?,
        None => Patch::default(),
    };
    match &args.render {
        Some(out) => render(&patch, out, args.sample_rate),
        None => play(&patch),
    }
}

fn play(patch: &Patch) -> anyhow::Result<()> {
    let (graph, audio) = audio::start_audio()?;
    let graph: Graph = Rc::new(graph);
    let mut session = Session::build(&graph, patch)?;
    log::info!("playing {}s at {} Hz", patch.seconds, audio.sample_rate());

    let tick_rate = Duration::from_millis(16); // ~60fps
    let started = Instant::now();
    session.sequencer.play();
    while started.elapsed().as_secs_f64() < patch.seconds {
        let tick_start = Instant::now();
        session.sequencer.update();
        if let Some(rest) = tick_rate.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    session.sequencer.stop();
    session.chain.teardown();
    drop(audio);
    Ok(())
}

fn render(patch: &Patch, out: &std::path::Path, sample_rate: u32) -> anyhow::Result<()> {
    anyhow::ensure!(sample_rate > 0, "sample rate must be positive");
    let (graph, mut engine) = RealtimeGraph::new(sample_rate as f64);
    let graph: Graph = Rc::new(graph);
    let mut session = Session::build(&graph, patch)?;

    session.sequencer.play();
    let frames = audio::render_offline(&mut engine, patch.seconds, 0.016, || session.sequencer.update());
    audio::write_wav(out, sample_rate, &frames)?;
    let peak = frames.iter().map(|f| f.peak()).fold(0.0f32, f32::max);
    log::info!("wrote {} ({} frames, peak {:.3})", out.display(), frames.len(), peak);
    Ok(())
}
