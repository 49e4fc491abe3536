use std::f32::consts::TAU;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use pulsecanvas_core::{
    AppConfig, DisplayList, HeadlessGpu, ManualFrameLoop, MicrophoneAccess, MusicVizError,
    RenderMode, SourceHandle, SourceId, Visualizer,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

type HeadlessVisualizer = Visualizer<ManualFrameLoop, DisplayList, HeadlessGpu>;

const REFRESH_RATE: u32 = 60;

fn main() -> pulsecanvas_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Modes => {
            list_modes();
            Ok(())
        }
        Commands::Run(args) => run_headless(&args),
        Commands::Tour {
            frames_per_mode,
            signal,
            config,
        } => run_tour(frames_per_mode, signal, config.as_ref()),
    }
}

fn list_modes() {
    for mode in RenderMode::ALL {
        let family = if mode.is_3d() { "3d" } else { "2d" };
        println!("{:<20} {family}", mode.name());
    }
}

fn run_headless(args: &RunArgs) -> pulsecanvas_core::Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(mode) = args.mode {
        config.render.initial_mode = mode;
    }
    tracing::info!(mode = %config.render.initial_mode, frames = args.frames, signal = ?args.signal, "starting headless run");

    let mut visualizer = headless(&config);
    let source = if args.microphone {
        let mut access = SyntheticMicrophone {
            denied: args.deny_microphone,
        };
        match visualizer.acquire_microphone(&mut access) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(error = %err, "falling back to the synthetic track");
                attach_track(&mut visualizer)?
            }
        }
    } else {
        attach_track(&mut visualizer)?
    };

    let mut signal = SignalGenerator::new(args.signal, config.audio.sample_rate);
    visualizer.set_playing(true);
    pump(&mut visualizer, &mut signal, source, args.frames);

    let scheduler = visualizer.scheduler();
    tracing::info!(
        frames_rendered = scheduler.frames_rendered(),
        failures = scheduler.failures(),
        draw_commands = visualizer.canvas().commands().len(),
        gpu_draws = visualizer.gpu().total_draws(),
        "run finished"
    );

    if let Some(path) = &args.dump {
        std::fs::write(path, visualizer.canvas().to_json()?)?;
        tracing::info!(?path, "wrote display list");
    }

    visualizer.shutdown();
    check_for_leaks(&visualizer)
}

fn run_tour(
    frames_per_mode: usize,
    kind: SignalKind,
    config: Option<&PathBuf>,
) -> pulsecanvas_core::Result<()> {
    let config = load_config(config)?;
    let mut visualizer = headless(&config);
    let source = attach_track(&mut visualizer)?;
    let mut signal = SignalGenerator::new(kind, config.audio.sample_rate);

    visualizer.set_playing(true);
    for mode in RenderMode::ALL {
        visualizer.set_mode(mode)?;
        let draws_before = visualizer.gpu().total_draws();
        pump(&mut visualizer, &mut signal, source, frames_per_mode);
        tracing::info!(
            %mode,
            canvas_commands = visualizer.canvas().commands().len(),
            gpu_draws = visualizer.gpu().total_draws() - draws_before,
            live_gpu_resources = visualizer.gpu().live_resources(),
            "mode toured"
        );
    }

    let failures = visualizer.scheduler().failures();
    visualizer.shutdown();
    check_for_leaks(&visualizer)?;
    if failures > 0 {
        return Err(MusicVizError::msg(format!("{failures} mode(s) failed during the tour")));
    }
    tracing::info!(modes = RenderMode::ALL.len(), "tour finished without leaks");
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> pulsecanvas_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::debug!(?path, "loading config");
            AppConfig::load(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn headless(config: &AppConfig) -> HeadlessVisualizer {
    let render = &config.render;
    Visualizer::new(
        config,
        ManualFrameLoop::new(),
        DisplayList::new(render.width, render.height),
        HeadlessGpu::new(render.width, render.height),
    )
}

fn attach_track(visualizer: &mut HeadlessVisualizer) -> pulsecanvas_core::Result<SourceId> {
    let track = SourceHandle::media_element(1, "synthetic-track");
    visualizer.set_source(&track)?;
    Ok(track.id)
}

/// Feeds one refresh interval of audio, then services the due frames.
fn pump(
    visualizer: &mut HeadlessVisualizer,
    signal: &mut SignalGenerator,
    source: SourceId,
    frames: usize,
) {
    for _ in 0..frames {
        let block = signal.next_block();
        visualizer.push_samples(source, &block);
        for token in visualizer.requester_mut().take_due() {
            visualizer.canvas_mut().begin_frame();
            visualizer.gpu_mut().begin_frame();
            visualizer.frame(token);
        }
    }
}

fn check_for_leaks(visualizer: &HeadlessVisualizer) -> pulsecanvas_core::Result<()> {
    let gpu = visualizer.gpu();
    if gpu.live_resources() == 0 {
        return Ok(());
    }
    Err(MusicVizError::msg(format!(
        "gpu resources leaked: {}",
        gpu.live_labels().join(", ")
    )))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Capture device stand-in for headless runs.
struct SyntheticMicrophone {
    denied: bool,
}

impl MicrophoneAccess for SyntheticMicrophone {
    fn acquire(&mut self) -> pulsecanvas_core::Result<SourceHandle> {
        if self.denied {
            return Err(MusicVizError::Acquisition("permission denied".into()));
        }
        Ok(SourceHandle::microphone(2))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SignalKind {
    Sine,
    Sweep,
    Noise,
    /// Kick drum every half second over light hi-hat noise.
    Pulse,
    Silence,
}

struct SignalGenerator {
    kind: SignalKind,
    sample_rate: f32,
    /// Samples produced so far.
    cursor: u64,
    phase: f32,
    rng: StdRng,
}

impl SignalGenerator {
    fn new(kind: SignalKind, sample_rate: u32) -> Self {
        Self {
            kind,
            sample_rate: sample_rate.max(1) as f32,
            cursor: 0,
            phase: 0.0,
            rng: StdRng::seed_from_u64(0x5eed),
        }
    }

    fn next_block(&mut self) -> Vec<f32> {
        let len = (self.sample_rate as u32 / REFRESH_RATE).max(1) as usize;
        (0..len).map(|_| self.next_sample()).collect()
    }

    fn next_sample(&mut self) -> f32 {
        let t = self.cursor as f32 / self.sample_rate;
        self.cursor += 1;
        match self.kind {
            SignalKind::Sine => self.oscillate(220.0) * 0.8,
            SignalKind::Sweep => {
                // 40 Hz to 8 kHz, exponentially, every five seconds.
                let progress = (t % 5.0) / 5.0;
                let frequency = 40.0 * 200f32.powf(progress);
                self.oscillate(frequency) * 0.7
            }
            SignalKind::Noise => self.rng.gen_range(-0.5f32..0.5),
            SignalKind::Pulse => {
                let beat = t % 0.5;
                let kick = (TAU * 55.0 * beat).sin() * (-beat * 18.0).exp();
                let hat = self.rng.gen_range(-0.08f32..0.08);
                kick * 0.9 + hat
            }
            SignalKind::Silence => 0.0,
        }
    }

    fn oscillate(&mut self, frequency: f32) -> f32 {
        self.phase = (self.phase + TAU * frequency / self.sample_rate) % TAU;
        self.phase.sin()
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every render mode and its family.
    Modes,
    /// Drive one mode headlessly from a synthetic source.
    Run(RunArgs),
    /// Switch through every mode in turn and report leaked GPU resources.
    Tour {
        #[arg(long, default_value_t = 60)]
        frames_per_mode: usize,
        #[arg(long, value_enum, default_value_t = SignalKind::Pulse)]
        signal: SignalKind,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Mode to render; defaults to the configured initial mode.
    #[arg(short, long)]
    mode: Option<RenderMode>,
    #[arg(short, long, default_value_t = 300)]
    frames: usize,
    #[arg(short, long, value_enum, default_value_t = SignalKind::Sine)]
    signal: SignalKind,
    /// Optional JSON config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write the last frame's display list here as JSON.
    #[arg(long)]
    dump: Option<PathBuf>,
    /// Analyse a synthetic capture device instead of the track.
    #[arg(long)]
    microphone: bool,
    /// Make the capture device refuse permission.
    #[arg(long, requires = "microphone")]
    deny_microphone: bool,
}
