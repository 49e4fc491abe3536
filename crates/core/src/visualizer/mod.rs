//! Top-level owner of the audio graph, the scheduler and both surfaces.
//! A host shell forwards its play/source/volume/mode events here and calls
//! [`Visualizer::frame`] from its refresh callback.

use crate::audio::{AudioEngine, MicrophoneAccess, SourceHandle, SourceId};
use crate::modes::{ModeRegistry, RenderMode};
use crate::render::{Canvas, GpuDevice, Surfaces, Viewport};
use crate::timeline::{FrameRequester, FrameToken, Scheduler};
use crate::{AppConfig, Result};

pub struct Visualizer<R: FrameRequester, C: Canvas, G: GpuDevice> {
    engine: AudioEngine,
    scheduler: Scheduler<R>,
    canvas: C,
    gpu: G,
}

impl<R: FrameRequester, C: Canvas, G: GpuDevice> Visualizer<R, C, G> {
    pub fn new(config: &AppConfig, requester: R, canvas: C, gpu: G) -> Self {
        Self::with_engine(
            AudioEngine::new(&config.audio),
            config,
            requester,
            canvas,
            gpu,
        )
    }

    /// Like [`Visualizer::new`] with a caller-built engine, e.g. one wired
    /// to a real output sink.
    pub fn with_engine(
        engine: AudioEngine,
        config: &AppConfig,
        requester: R,
        mut canvas: C,
        gpu: G,
    ) -> Self {
        let render = &config.render;
        let viewport = Viewport {
            pixel_ratio: render.pixel_ratio,
            ..Viewport::new(render.width, render.height)
        };
        let (width, height) = viewport.physical_size();
        canvas.resize(width, height);

        let scheduler = Scheduler::new(
            requester,
            ModeRegistry::with_builtin_modes(),
            render.initial_mode,
            viewport,
        );
        Self {
            engine,
            scheduler,
            canvas,
            gpu,
        }
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn scheduler(&self) -> &Scheduler<R> {
        &self.scheduler
    }

    pub fn requester_mut(&mut self) -> &mut R {
        self.scheduler.requester_mut()
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    pub fn mode(&self) -> RenderMode {
        self.scheduler.mode()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn set_playing(&mut self, playing: bool) {
        let mut surfaces = Surfaces::new(&mut self.canvas, &mut self.gpu);
        if playing {
            self.scheduler.start(&mut surfaces);
        } else {
            self.scheduler.stop(&mut surfaces);
        }
    }

    /// Reacts to "source changed" from the playback side.
    pub fn set_source(&mut self, source: &SourceHandle) -> Result<()> {
        self.engine.connect_source(source)
    }

    pub fn acquire_microphone(&mut self, access: &mut dyn MicrophoneAccess) -> Result<SourceId> {
        self.engine.connect_microphone(access)
    }

    /// Hands a block of decoded samples to the graph.
    pub fn push_samples(&mut self, source: SourceId, samples: &[f32]) {
        self.engine.push_samples(source, samples);
    }

    pub fn set_volume(&mut self, level: f32) {
        self.engine.set_output_level(level);
    }

    pub fn set_mode(&mut self, mode: RenderMode) -> Result<()> {
        let mut surfaces = Surfaces::new(&mut self.canvas, &mut self.gpu);
        self.scheduler.set_mode(mode, &mut surfaces)
    }

    pub fn resize(&mut self, viewport: Viewport) {
        let mut surfaces = Surfaces::new(&mut self.canvas, &mut self.gpu);
        self.scheduler.resize(viewport, &mut surfaces);
    }

    /// Refresh callback. Returns whether `token` produced a frame.
    pub fn frame(&mut self, token: FrameToken) -> bool {
        let mut surfaces = Surfaces::new(&mut self.canvas, &mut self.gpu);
        self.scheduler
            .on_frame(token, &mut self.engine, &mut surfaces)
    }

    /// Stops rendering, releases the active mode and detaches the source.
    pub fn shutdown(&mut self) {
        tracing::debug!("visualizer shutting down");
        self.set_playing(false);
        self.engine.disconnect();
    }
}
