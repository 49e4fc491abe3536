use super::{shaders, SceneFrame, SceneMode};
use crate::modes::RenderMode;
use crate::render::{GpuDevice, TextureId, Viewport};
use crate::scene::{NodeId, SceneGraph};
use crate::{MusicVizError, Result};

const BASE_DECAY: f32 = 0.92;

/// Pulsing flower drawn over a zoomed copy of the previous frame. Two
/// feedback targets at the backing-store size are swapped every frame.
#[derive(Debug, Clone, Default)]
pub struct FluxBloom {
    targets: Vec<TextureId>,
    /// Index of the target written this frame; the other one is read.
    current: usize,
    node: Option<NodeId>,
    decay: f32,
}

impl FluxBloom {
    pub fn targets(&self) -> &[TextureId] {
        &self.targets
    }

    fn allocate_targets(
        &mut self,
        scene: &mut SceneGraph,
        gpu: &mut dyn GpuDevice,
        viewport: Viewport,
    ) -> Result<()> {
        for stale in self.targets.drain(..) {
            scene.release_texture(gpu, stale);
        }
        let (width, height) = viewport.physical_size();
        for label in ["flux-feedback-a", "flux-feedback-b"] {
            let target = scene.create_texture(gpu, label, width, height)?;
            self.targets.push(target);
        }
        self.current = 0;
        self.bind_read_target(scene)
    }

    fn bind_read_target(&self, scene: &mut SceneGraph) -> Result<()> {
        let read = *self
            .targets
            .get(1 - self.current)
            .ok_or(MusicVizError::InvalidInput("feedback targets missing"))?;
        if let Some(node) = self.node {
            if let Some(node) = scene.node_mut(node) {
                node.textures = vec![read];
            }
        }
        Ok(())
    }
}

impl SceneMode for FluxBloom {
    const MODE: RenderMode = RenderMode::FluxBloom;

    fn build(&mut self, scene: &mut SceneGraph, gpu: &mut dyn GpuDevice) -> Result<()> {
        let program = scene.create_program(gpu, "flux-bloom", shaders::FLUX_BLOOM)?;
        self.node = Some(scene.add_fullscreen_quad(gpu, "bloom", program, Vec::new())?);
        self.decay = BASE_DECAY;
        let viewport = scene.viewport();
        self.allocate_targets(scene, gpu, viewport)
    }

    fn animate(
        &mut self,
        scene: &mut SceneGraph,
        _gpu: &mut dyn GpuDevice,
        frame: &SceneFrame,
    ) -> Result<()> {
        self.current = 1 - self.current;
        self.decay = BASE_DECAY - frame.audio.rms * 0.1;
        self.bind_read_target(scene)
    }

    fn mode_param(&self) -> f32 {
        self.decay
    }

    fn resize(
        &mut self,
        scene: &mut SceneGraph,
        gpu: &mut dyn GpuDevice,
        viewport: Viewport,
    ) -> Result<()> {
        self.allocate_targets(scene, gpu, viewport)
    }
}
