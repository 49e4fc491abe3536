//! Canvas-drawn modes.
//!
//! Every 2D mode is a [`CanvasMode`]: a plain state struct plus a draw step.
//! [`CanvasRenderer`] supplies the lifecycle around it and applies the
//! mode's clear policy before each frame.

use glam::Vec2;

use crate::modes::{ModeRegistry, RenderMode};
use crate::render::{Canvas, ClearPolicy, Renderer, Surfaces, Viewport};
use crate::{AudioSnapshot, Result};

pub mod circular;
pub mod kaleidoscope;
pub mod lattice;
pub mod pulse_tunnel;
pub mod spectrogram;
pub mod starfall;
pub mod tidal_bloom;
pub mod voxel_octopus;
pub mod waveform;
pub mod wireframe_matrix;

pub use circular::Circular;
pub use kaleidoscope::Kaleidoscope;
pub use lattice::Lattice;
pub use pulse_tunnel::PulseTunnel;
pub use spectrogram::Spectrogram;
pub use starfall::Starfall;
pub use tidal_bloom::TidalBloom;
pub use voxel_octopus::VoxelOctopus;
pub use waveform::Waveform;
pub use wireframe_matrix::WireframeMatrix;

pub trait CanvasMode {
    const MODE: RenderMode;

    fn clear_policy(&self) -> ClearPolicy;

    /// Mutates mode state and draws one frame. `canvas` is already cleared
    /// according to [`CanvasMode::clear_policy`].
    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot);

    /// Surface dimensions changed. Animation state must survive.
    fn resize(&mut self, _size: Vec2) {}
}

/// Lifecycle wrapper shared by every 2D mode.
#[derive(Debug, Default)]
pub struct CanvasRenderer<M> {
    state: M,
    active: bool,
}

impl<M: CanvasMode + Default> CanvasRenderer<M> {
    pub fn new() -> Self {
        Self {
            state: M::default(),
            active: false,
        }
    }
}

impl<M> CanvasRenderer<M> {
    pub fn state(&self) -> &M {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl<M: CanvasMode> Renderer for CanvasRenderer<M> {
    fn mode(&self) -> RenderMode {
        M::MODE
    }

    fn activate(&mut self, surfaces: &mut Surfaces<'_>, _viewport: Viewport) -> Result<()> {
        surfaces.canvas.clear();
        self.state.resize(surfaces.canvas.size());
        self.active = true;
        Ok(())
    }

    fn update(&mut self, surfaces: &mut Surfaces<'_>, snapshot: &AudioSnapshot) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let canvas = &mut *surfaces.canvas;
        canvas.apply_clear(self.state.clear_policy());
        canvas.save();
        self.state.draw(canvas, snapshot);
        canvas.restore();
        Ok(())
    }

    fn resize(&mut self, surfaces: &mut Surfaces<'_>, _viewport: Viewport) -> Result<()> {
        self.state.resize(surfaces.canvas.size());
        Ok(())
    }

    fn deactivate(&mut self, surfaces: &mut Surfaces<'_>) {
        if self.active {
            surfaces.canvas.clear();
            self.active = false;
        }
    }
}

fn create<M: CanvasMode + Default + 'static>() -> Box<dyn Renderer> {
    Box::new(CanvasRenderer::<M>::new())
}

pub(crate) fn register(registry: &mut ModeRegistry) {
    registry.register(RenderMode::Spectrogram, create::<Spectrogram>);
    registry.register(RenderMode::Circular, create::<Circular>);
    registry.register(RenderMode::Waveform, create::<Waveform>);
    registry.register(RenderMode::Kaleidoscope, create::<Kaleidoscope>);
    registry.register(RenderMode::Lattice, create::<Lattice>);
    registry.register(RenderMode::PulseTunnel, create::<PulseTunnel>);
    registry.register(RenderMode::Starfall, create::<Starfall>);
    registry.register(RenderMode::TidalBloom, create::<TidalBloom>);
    registry.register(RenderMode::VoxelOctopus, create::<VoxelOctopus>);
    registry.register(RenderMode::WireframeMatrix, create::<WireframeMatrix>);
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DisplayList, DrawCommand, HeadlessGpu};

    #[test]
    fn fresh_renderer_draws_nothing_until_activated() {
        let mut canvas = DisplayList::new(200, 100);
        let mut gpu = HeadlessGpu::new(200, 100);
        let mut surfaces = Surfaces::new(&mut canvas, &mut gpu);
        let mut renderer = CanvasRenderer::<Waveform>::new();

        renderer
            .update(&mut surfaces, &testing::snapshot(100, 100, 100))
            .unwrap();
        assert!(canvas.commands().is_empty());
    }

    #[test]
    fn every_canvas_mode_survives_edge_snapshots() {
        let registry = ModeRegistry::with_builtin_modes();
        let inputs = [
            AudioSnapshot::empty(),
            testing::silence(),
            testing::snapshot(255, 255, 255),
        ];
        for mode in RenderMode::ALL.into_iter().filter(|mode| !mode.is_3d()) {
            let mut canvas = DisplayList::new(320, 200);
            let mut gpu = HeadlessGpu::new(320, 200);
            let mut surfaces = Surfaces::new(&mut canvas, &mut gpu);
            let mut renderer = registry.create(mode).unwrap();
            renderer
                .activate(&mut surfaces, Viewport::new(320, 200))
                .unwrap();
            for _ in 0..30 {
                for snapshot in &inputs {
                    renderer.update(&mut surfaces, snapshot).unwrap();
                }
            }
            renderer.deactivate(&mut surfaces);
            assert_eq!(canvas.depth(), 0, "{mode} leaked a save()");
            assert_eq!(gpu.live_resources(), 0, "{mode} touched the gpu");
        }
    }

    #[test]
    fn clear_policy_is_applied_first() {
        let mut canvas = DisplayList::new(200, 100);
        let mut gpu = HeadlessGpu::new(200, 100);
        let mut surfaces = Surfaces::new(&mut canvas, &mut gpu);
        let mut renderer = CanvasRenderer::<Spectrogram>::new();
        renderer
            .activate(&mut surfaces, Viewport::new(200, 100))
            .unwrap();
        canvas.begin_frame();

        let mut surfaces = Surfaces::new(&mut canvas, &mut gpu);
        renderer
            .update(&mut surfaces, &testing::snapshot(50, 50, 50))
            .unwrap();
        assert!(matches!(
            canvas.commands()[0],
            DrawCommand::FillRect { color, .. } if color.a < 1.0
        ));
    }
}
