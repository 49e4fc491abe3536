//! Frame pacing: the fixed-step clock of the 3D modes and the scheduler
//! that chains one display-refresh callback after another.

use serde::{Deserialize, Serialize};

use crate::audio::AudioEngine;
use crate::modes::{ModeRegistry, RenderMode};
use crate::render::{Renderer, Surfaces, Viewport};
use crate::{MusicVizError, Result};

/// Accumulates a constant step per rendered frame, independent of wall time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    time: f32,
    delta: f32,
}

impl FrameClock {
    pub fn new(delta: f32) -> Self {
        Self {
            time: 0.0,
            delta: delta.max(0.0),
        }
    }

    /// Steps the clock and returns the new time.
    pub fn advance(&mut self) -> f32 {
        self.time += self.delta;
        self.time
    }

    pub fn reset(&mut self) {
        self.time = 0.0;
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }
}

/// Identifies one outstanding frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameToken(pub u64);

/// "Call me again when the next frame is ready to be drawn."
pub trait FrameRequester {
    fn request_frame(&mut self) -> FrameToken;
    fn cancel_frame(&mut self, token: FrameToken);
}

/// Frame source for headless hosts: requests queue up until the host pulls
/// them with [`ManualFrameLoop::take_due`], standing in for a vsync.
#[derive(Debug, Default)]
pub struct ManualFrameLoop {
    next: u64,
    pending: Vec<FrameToken>,
    max_pending: usize,
    requested: u64,
    cancelled: u64,
}

impl ManualFrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out every request made since the previous call.
    pub fn take_due(&mut self) -> Vec<FrameToken> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Largest number of requests that were ever outstanding at once.
    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameRequester for ManualFrameLoop {
    fn request_frame(&mut self) -> FrameToken {
        self.next += 1;
        let token = FrameToken(self.next);
        self.pending.push(token);
        self.requested += 1;
        self.max_pending = self.max_pending.max(self.pending.len());
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        let before = self.pending.len();
        self.pending.retain(|pending| *pending != token);
        if self.pending.len() != before {
            self.cancelled += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Drives the active renderer once per display refresh while playing.
///
/// At most one frame request is outstanding at any time. The active mode
/// owns a renderer instance built fresh by the registry on every
/// activation and dropped on deactivation.
pub struct Scheduler<R: FrameRequester> {
    requester: R,
    registry: ModeRegistry,
    mode: RenderMode,
    renderer: Option<Box<dyn Renderer>>,
    viewport: Viewport,
    state: SchedulerState,
    pending: Option<FrameToken>,
    frames_rendered: u64,
    failures: u64,
}

impl<R: FrameRequester> Scheduler<R> {
    pub fn new(requester: R, registry: ModeRegistry, mode: RenderMode, viewport: Viewport) -> Self {
        Self {
            requester,
            registry,
            mode,
            renderer: None,
            viewport,
            state: SchedulerState::Stopped,
            pending: None,
            frames_rendered: 0,
            failures: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Whether a renderer is live. False while stopped and after a failure.
    pub fn has_active_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn pending(&self) -> Option<FrameToken> {
        self.pending
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Number of times a renderer was shut down because it failed.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn registry(&self) -> &ModeRegistry {
        &self.registry
    }

    pub fn requester(&self) -> &R {
        &self.requester
    }

    pub fn requester_mut(&mut self) -> &mut R {
        &mut self.requester
    }

    pub fn start(&mut self, surfaces: &mut Surfaces<'_>) {
        if self.is_running() {
            return;
        }
        tracing::debug!(mode = %self.mode, "scheduler started");
        self.state = SchedulerState::Running;
        self.activate_current(surfaces);
        self.pending = Some(self.requester.request_frame());
    }

    /// Cancels the outstanding frame and releases the active renderer.
    pub fn stop(&mut self, surfaces: &mut Surfaces<'_>) {
        if !self.is_running() {
            return;
        }
        tracing::debug!(mode = %self.mode, "scheduler stopped");
        self.state = SchedulerState::Stopped;
        if let Some(token) = self.pending.take() {
            self.requester.cancel_frame(token);
        }
        self.deactivate_current(surfaces);
    }

    /// Swaps the active mode. Selecting the current mode keeps its state.
    pub fn set_mode(&mut self, mode: RenderMode, surfaces: &mut Surfaces<'_>) -> Result<()> {
        if mode == self.mode {
            return Ok(());
        }
        if !self.registry.contains(mode) {
            return Err(MusicVizError::UnknownMode(mode.to_string()));
        }

        tracing::debug!(from = %self.mode, to = %mode, "switching mode");
        self.deactivate_current(surfaces);
        self.mode = mode;
        if self.is_running() {
            self.activate_current(surfaces);
        }
        Ok(())
    }

    /// Resizes the canvas backing store and lets the active renderer adapt
    /// its geometry. Animation state survives.
    pub fn resize(&mut self, viewport: Viewport, surfaces: &mut Surfaces<'_>) {
        self.viewport = viewport;
        let (width, height) = viewport.physical_size();
        surfaces.canvas.resize(width, height);

        let result = match self.renderer.as_mut() {
            Some(renderer) => renderer.resize(surfaces, viewport),
            None => Ok(()),
        };
        if let Err(err) = result {
            self.fail_closed(surfaces, &err);
        }
    }

    /// Runs one frame for `token`. Returns `false` when the token is not the
    /// outstanding request, e.g. one issued before a stop.
    pub fn on_frame(
        &mut self,
        token: FrameToken,
        engine: &mut AudioEngine,
        surfaces: &mut Surfaces<'_>,
    ) -> bool {
        if !self.is_running() || self.pending != Some(token) {
            tracing::trace!(token = token.0, "ignoring stale frame");
            return false;
        }
        self.pending = None;

        let snapshot = engine.snapshot();
        let result = match self.renderer.as_mut() {
            Some(renderer) => renderer.update(surfaces, &snapshot).map(|()| true),
            None => Ok(false),
        };
        match result {
            Ok(true) => self.frames_rendered += 1,
            Ok(false) => {}
            Err(err) => self.fail_closed(surfaces, &err),
        }

        self.pending = Some(self.requester.request_frame());
        true
    }

    fn activate_current(&mut self, surfaces: &mut Surfaces<'_>) {
        let mut renderer = match self.registry.create(self.mode) {
            Ok(renderer) => renderer,
            Err(err) => {
                tracing::warn!(mode = %self.mode, error = %err, "mode unavailable");
                return;
            }
        };
        match renderer.activate(surfaces, self.viewport) {
            Ok(()) => {
                tracing::debug!(mode = %self.mode, "mode activated");
                self.renderer = Some(renderer);
            }
            Err(err) => {
                tracing::warn!(mode = %self.mode, error = %err, "mode failed to activate");
                renderer.deactivate(surfaces);
                self.failures += 1;
            }
        }
    }

    fn deactivate_current(&mut self, surfaces: &mut Surfaces<'_>) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.deactivate(surfaces);
            tracing::debug!(mode = %self.mode, "mode deactivated");
        }
    }

    fn fail_closed(&mut self, surfaces: &mut Surfaces<'_>, err: &MusicVizError) {
        tracing::warn!(mode = %self.mode, error = %err, "renderer failed, stopping mode");
        self.failures += 1;
        self.deactivate_current(surfaces);
    }
}

impl<R: FrameRequester> std::fmt::Debug for Scheduler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("active", &self.renderer.is_some())
            .field("pending", &self.pending)
            .field("frames_rendered", &self.frames_rendered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::audio::SourceHandle;
    use crate::render::{Canvas, DisplayList, HeadlessGpu};
    use crate::{AudioConfig, AudioSnapshot};

    thread_local! {
        static PROBE_FRAMES: RefCell<Vec<u32>> = RefCell::new(Vec::new());
    }

    /// Records how many frames its own instance has seen.
    #[derive(Default)]
    struct Probe {
        frames: u32,
    }

    impl Renderer for Probe {
        fn mode(&self) -> RenderMode {
            RenderMode::Waveform
        }

        fn activate(&mut self, _: &mut Surfaces<'_>, _: Viewport) -> Result<()> {
            Ok(())
        }

        fn update(&mut self, _: &mut Surfaces<'_>, _: &AudioSnapshot) -> Result<()> {
            self.frames += 1;
            PROBE_FRAMES.with(|frames| frames.borrow_mut().push(self.frames));
            Ok(())
        }

        fn resize(&mut self, _: &mut Surfaces<'_>, _: Viewport) -> Result<()> {
            Ok(())
        }

        fn deactivate(&mut self, _: &mut Surfaces<'_>) {}
    }

    fn probe() -> Box<dyn Renderer> {
        Box::new(Probe::default())
    }

    fn pump(
        scheduler: &mut Scheduler<ManualFrameLoop>,
        engine: &mut AudioEngine,
        canvas: &mut DisplayList,
        gpu: &mut HeadlessGpu,
        frames: usize,
    ) {
        for _ in 0..frames {
            for token in scheduler.requester_mut().take_due() {
                canvas.begin_frame();
                gpu.begin_frame();
                let mut surfaces = Surfaces::new(&mut *canvas, &mut *gpu);
                scheduler.on_frame(token, engine, &mut surfaces);
            }
        }
    }

    fn rig(mode: RenderMode) -> (Scheduler<ManualFrameLoop>, AudioEngine, DisplayList, HeadlessGpu) {
        let scheduler = Scheduler::new(
            ManualFrameLoop::new(),
            ModeRegistry::with_builtin_modes(),
            mode,
            Viewport::new(320, 180),
        );
        let mut engine = AudioEngine::new(&AudioConfig::default());
        let source = SourceHandle::media_element(1, "test-tone");
        engine.connect_source(&source).unwrap();
        let tone: Vec<f32> = (0..2048).map(|i| (i as f32 * 0.05).sin()).collect();
        engine.push_samples(source.id, &tone);
        (scheduler, engine, DisplayList::new(320, 180), HeadlessGpu::new(320, 180))
    }

    #[test]
    fn clock_steps_by_its_delta() {
        let mut clock = FrameClock::new(0.01);
        for _ in 0..3 {
            clock.advance();
        }
        assert!((clock.time() - 0.03).abs() < 1e-6);
        clock.reset();
        assert_eq!(clock.time(), 0.0);
    }

    #[test]
    fn stop_then_start_never_duplicates_the_chain() {
        let (mut scheduler, mut engine, mut canvas, mut gpu) = rig(RenderMode::Spectrogram);
        {
            let mut surfaces = Surfaces::new(&mut canvas, &mut gpu);
            scheduler.start(&mut surfaces);
            scheduler.start(&mut surfaces);
        }
        pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 5);
        assert_eq!(scheduler.frames_rendered(), 5);

        let stale = scheduler.requester_mut().take_due();
        assert_eq!(stale.len(), 1);
        {
            let mut surfaces = Surfaces::new(&mut canvas, &mut gpu);
            scheduler.stop(&mut surfaces);
            scheduler.stop(&mut surfaces);
            scheduler.start(&mut surfaces);
            assert!(!scheduler.on_frame(stale[0], &mut engine, &mut surfaces));
        }
        pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 5);

        assert_eq!(scheduler.frames_rendered(), 10);
        assert_eq!(scheduler.requester().max_pending(), 1);
        assert_eq!(scheduler.requester().pending(), 1);
    }

    #[test]
    fn stopping_cancels_the_outstanding_request() {
        let (mut scheduler, mut engine, mut canvas, mut gpu) = rig(RenderMode::ParticleGalaxy);
        let mut surfaces = Surfaces::new(&mut canvas, &mut gpu);
        scheduler.start(&mut surfaces);
        let token = scheduler.pending().unwrap();
        scheduler.stop(&mut surfaces);

        assert_eq!(scheduler.requester().cancelled(), 1);
        assert_eq!(scheduler.requester().pending(), 0);
        assert!(!scheduler.on_frame(token, &mut engine, &mut surfaces));
        assert!(!scheduler.has_active_renderer());
        drop(surfaces);
        assert_eq!(gpu.live_resources(), 0);
    }

    #[test]
    fn switching_modes_starts_from_fresh_state() {
        let mut registry = ModeRegistry::new();
        registry.register(RenderMode::Waveform, probe);
        registry.register(RenderMode::Circular, probe);
        let mut scheduler = Scheduler::new(
            ManualFrameLoop::new(),
            registry,
            RenderMode::Waveform,
            Viewport::new(64, 64),
        );
        let mut engine = AudioEngine::new(&AudioConfig::default());
        let mut canvas = DisplayList::new(64, 64);
        let mut gpu = HeadlessGpu::new(64, 64);
        PROBE_FRAMES.with(|frames| frames.borrow_mut().clear());

        scheduler.start(&mut Surfaces::new(&mut canvas, &mut gpu));
        pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 4);
        scheduler
            .set_mode(RenderMode::Circular, &mut Surfaces::new(&mut canvas, &mut gpu))
            .unwrap();
        pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 2);
        scheduler
            .set_mode(RenderMode::Waveform, &mut Surfaces::new(&mut canvas, &mut gpu))
            .unwrap();
        pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 1);

        let frames = PROBE_FRAMES.with(|frames| frames.borrow().clone());
        assert_eq!(frames, vec![1, 2, 3, 4, 1, 2, 1]);
    }

    #[test]
    fn same_mode_keeps_state_and_unknown_mode_is_rejected() {
        let mut registry = ModeRegistry::new();
        registry.register(RenderMode::Waveform, probe);
        let mut scheduler = Scheduler::new(
            ManualFrameLoop::new(),
            registry,
            RenderMode::Waveform,
            Viewport::new(64, 64),
        );
        let mut canvas = DisplayList::new(64, 64);
        let mut gpu = HeadlessGpu::new(64, 64);
        let mut surfaces = Surfaces::new(&mut canvas, &mut gpu);
        scheduler.start(&mut surfaces);

        scheduler.set_mode(RenderMode::Waveform, &mut surfaces).unwrap();
        assert!(scheduler.has_active_renderer());
        assert!(matches!(
            scheduler.set_mode(RenderMode::FluxBloom, &mut surfaces),
            Err(MusicVizError::UnknownMode(_))
        ));
        assert_eq!(scheduler.mode(), RenderMode::Waveform);
        assert!(scheduler.has_active_renderer());
    }

    #[test]
    fn repeated_switches_leak_no_gpu_resources() {
        let (mut scheduler, mut engine, mut canvas, mut gpu) = rig(RenderMode::Spectrogram);
        scheduler.start(&mut Surfaces::new(&mut canvas, &mut gpu));
        for _ in 0..3 {
            for mode in RenderMode::ALL {
                scheduler
                    .set_mode(mode, &mut Surfaces::new(&mut canvas, &mut gpu))
                    .unwrap();
                pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 2);
            }
        }
        scheduler
            .set_mode(RenderMode::Waveform, &mut Surfaces::new(&mut canvas, &mut gpu))
            .unwrap();
        assert_eq!(gpu.live_resources(), 0, "{:?}", gpu.live_labels());
        assert_eq!(scheduler.failures(), 0);
    }

    #[test]
    fn resize_reaches_canvas_without_resetting_the_mode() {
        let (mut scheduler, mut engine, mut canvas, mut gpu) = rig(RenderMode::Lattice);
        scheduler.start(&mut Surfaces::new(&mut canvas, &mut gpu));
        pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 3);

        let mut viewport = Viewport::new(640, 360);
        viewport.pixel_ratio = 2.0;
        scheduler.resize(viewport, &mut Surfaces::new(&mut canvas, &mut gpu));
        assert_eq!(canvas.size(), glam::Vec2::new(1280.0, 720.0));
        assert!(scheduler.has_active_renderer());
        assert_eq!(scheduler.viewport(), viewport);
    }

    #[test]
    fn resize_keeps_the_same_renderer_instance() {
        let mut registry = ModeRegistry::new();
        registry.register(RenderMode::Waveform, probe);
        let mut scheduler = Scheduler::new(
            ManualFrameLoop::new(),
            registry,
            RenderMode::Waveform,
            Viewport::new(64, 64),
        );
        let mut engine = AudioEngine::new(&AudioConfig::default());
        let mut canvas = DisplayList::new(64, 64);
        let mut gpu = HeadlessGpu::new(64, 64);
        PROBE_FRAMES.with(|frames| frames.borrow_mut().clear());

        scheduler.start(&mut Surfaces::new(&mut canvas, &mut gpu));
        pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 3);
        scheduler.resize(Viewport::new(128, 96), &mut Surfaces::new(&mut canvas, &mut gpu));
        pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 2);

        let frames = PROBE_FRAMES.with(|frames| frames.borrow().clone());
        assert_eq!(frames, vec![1, 2, 3, 4, 5]);
        assert_eq!(canvas.size(), glam::Vec2::new(128.0, 96.0));
    }

    #[test]
    fn lost_context_stops_the_mode_but_not_the_chain() {
        let (mut scheduler, mut engine, mut canvas, mut gpu) = rig(RenderMode::CrystalLattice);
        scheduler.start(&mut Surfaces::new(&mut canvas, &mut gpu));
        pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 2);
        assert!(gpu.live_resources() > 0);

        gpu.lose_context();
        pump(&mut scheduler, &mut engine, &mut canvas, &mut gpu, 3);

        assert!(!scheduler.has_active_renderer());
        assert_eq!(scheduler.failures(), 1);
        assert_eq!(scheduler.frames_rendered(), 2);
        assert!(scheduler.is_running());
        assert_eq!(scheduler.requester().pending(), 1);
        assert_eq!(gpu.live_resources(), 0);
    }
}
