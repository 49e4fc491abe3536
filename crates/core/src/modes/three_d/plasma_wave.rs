use super::{shaders, SceneFrame, SceneMode};
use crate::modes::RenderMode;
use crate::render::GpuDevice;
use crate::scene::SceneGraph;
use crate::Result;

/// Classic sine plasma on a fullscreen quad. Bass warps the phase forward
/// on top of the clock.
#[derive(Debug, Clone, Default)]
pub struct PlasmaWave {
    warp: f32,
}

impl SceneMode for PlasmaWave {
    const MODE: RenderMode = RenderMode::PlasmaWave;

    fn build(&mut self, scene: &mut SceneGraph, gpu: &mut dyn GpuDevice) -> Result<()> {
        let program = scene.create_program(gpu, "plasma-wave", shaders::PLASMA)?;
        scene.add_fullscreen_quad(gpu, "plasma", program, Vec::new())?;
        Ok(())
    }

    fn animate(
        &mut self,
        _scene: &mut SceneGraph,
        _gpu: &mut dyn GpuDevice,
        frame: &SceneFrame,
    ) -> Result<()> {
        self.warp += frame.audio.bass * 0.03;
        Ok(())
    }

    fn mode_param(&self) -> f32 {
        self.warp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessGpu, Viewport};
    use crate::scene::NodeKind;
    use crate::NormalizedBands;

    #[test]
    fn warp_follows_bass_and_one_quad_is_drawn() {
        let mut gpu = HeadlessGpu::new(64, 64);
        let mut scene = SceneGraph::new(&mut gpu, Viewport::new(64, 64)).unwrap();
        let mut plasma = PlasmaWave::default();
        plasma.build(&mut scene, &mut gpu).unwrap();

        let mut frame = SceneFrame {
            time: 0.1,
            audio: NormalizedBands::default(),
            beat: false,
        };
        plasma.animate(&mut scene, &mut gpu, &frame).unwrap();
        assert_eq!(plasma.mode_param(), 0.0);

        frame.audio.bass = 1.0;
        for _ in 0..10 {
            plasma.animate(&mut scene, &mut gpu, &frame).unwrap();
        }
        assert!((plasma.mode_param() - 0.3).abs() < 1e-5);

        assert_eq!(scene.nodes().len(), 1);
        assert!(matches!(scene.nodes()[0].kind, NodeKind::FullscreenQuad));
        gpu.begin_frame();
        scene
            .render(&mut gpu, frame.audio, frame.time, plasma.mode_param())
            .unwrap();
        assert_eq!(gpu.frame_draws().len(), 1);
        assert_eq!(scene.uniforms().params[3], plasma.mode_param());
        scene.dispose(&mut gpu);
    }
}
