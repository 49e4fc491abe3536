//! Rendering contract shared by every visual mode.

pub mod canvas;
pub mod gpu;

use serde::{Deserialize, Serialize};

pub use canvas::{BlendMode, Canvas, ClearPolicy, DisplayList, DrawCommand, Rgba, Stroke};
pub use gpu::{
    BufferId, BufferUsage, DrawCall, GpuDevice, HeadlessGpu, ProgramId, TextureId, Topology,
};

use crate::{AudioSnapshot, RenderMode, Result};

/// Drawing-surface dimensions in CSS pixels plus the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            pixel_ratio: 1.0,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    /// Backing-store size in device pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        let ratio = if self.pixel_ratio > 0.0 { self.pixel_ratio } else { 1.0 };
        (
            ((self.width as f32 * ratio).round() as u32).max(1),
            ((self.height as f32 * ratio).round() as u32).max(1),
        )
    }
}

/// The two process-wide output surfaces. 2D modes draw on the canvas, 3D
/// modes own resources on the GPU device.
pub struct Surfaces<'a> {
    pub canvas: &'a mut dyn Canvas,
    pub gpu: &'a mut dyn GpuDevice,
}

impl<'a> Surfaces<'a> {
    pub fn new(canvas: &'a mut dyn Canvas, gpu: &'a mut dyn GpuDevice) -> Self {
        Self { canvas, gpu }
    }
}

/// One visual program. An instance is created on activation and dropped on
/// deactivation, so all of its state is fresh every time the mode is
/// entered.
pub trait Renderer {
    fn mode(&self) -> RenderMode;

    /// Allocates whatever the mode needs. On error nothing stays allocated.
    fn activate(&mut self, surfaces: &mut Surfaces<'_>, viewport: Viewport) -> Result<()>;

    /// Advances the mode by one frame and draws it.
    fn update(&mut self, surfaces: &mut Surfaces<'_>, snapshot: &AudioSnapshot) -> Result<()>;

    /// Adapts geometry and projection. Animation state is left untouched.
    fn resize(&mut self, surfaces: &mut Surfaces<'_>, viewport: Viewport) -> Result<()>;

    /// Releases every resource acquired by `activate`. Must be safe to call
    /// after a failed update.
    fn deactivate(&mut self, surfaces: &mut Surfaces<'_>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size_applies_pixel_ratio() {
        let viewport = Viewport {
            width: 800,
            height: 600,
            pixel_ratio: 2.0,
        };
        assert_eq!(viewport.physical_size(), (1600, 1200));
        assert!((viewport.aspect() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_sizes_are_clamped() {
        let viewport = Viewport::new(0, 0);
        assert_eq!(viewport.physical_size(), (1, 1));
        assert_eq!(viewport.aspect(), 1.0);
    }
}
