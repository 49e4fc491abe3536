use glam::Vec3;

use super::{shaders, SceneFrame, SceneMode};
use crate::modes::RenderMode;
use crate::render::GpuDevice;
use crate::scene::SceneGraph;
use crate::Result;

const BASE_POWER: f32 = 8.0;
const BASS_POWER: f32 = 4.0;
const POWER_SMOOTHING: f32 = 0.1;

/// Raymarched Mandelbulb. The bulb power eases toward `8 + 4 * bass` and
/// the camera drifts around it on the clock.
#[derive(Debug, Clone)]
pub struct FractalCosmos {
    power: f32,
}

impl Default for FractalCosmos {
    fn default() -> Self {
        Self { power: BASE_POWER }
    }
}

impl SceneMode for FractalCosmos {
    const MODE: RenderMode = RenderMode::FractalCosmos;

    fn build(&mut self, scene: &mut SceneGraph, gpu: &mut dyn GpuDevice) -> Result<()> {
        let program = scene.create_program(gpu, "fractal-cosmos", shaders::MANDELBULB)?;
        scene.add_fullscreen_quad(gpu, "mandelbulb", program, Vec::new())?;
        Ok(())
    }

    fn animate(
        &mut self,
        scene: &mut SceneGraph,
        _gpu: &mut dyn GpuDevice,
        frame: &SceneFrame,
    ) -> Result<()> {
        let target = BASE_POWER + frame.audio.bass * BASS_POWER;
        self.power += (target - self.power) * POWER_SMOOTHING;

        // The shader marches from the camera position toward the origin.
        let time = frame.time;
        let distance = 2.6 - frame.audio.mid * 0.3;
        scene.camera.look_at(
            Vec3::new(
                (time * 0.2).cos() * distance,
                (time * 0.13).sin() * 0.8,
                (time * 0.2).sin() * distance,
            ),
            Vec3::ZERO,
        );
        Ok(())
    }

    fn mode_param(&self) -> f32 {
        self.power
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessGpu, Viewport};
    use crate::NormalizedBands;

    #[test]
    fn power_eases_toward_bass_target() {
        let mut gpu = HeadlessGpu::new(64, 64);
        let mut scene = SceneGraph::new(&mut gpu, Viewport::new(64, 64)).unwrap();
        let mut cosmos = FractalCosmos::default();
        cosmos.build(&mut scene, &mut gpu).unwrap();

        let frame = SceneFrame {
            time: 0.0,
            audio: NormalizedBands {
                bass: 1.0,
                ..Default::default()
            },
            beat: false,
        };
        cosmos.animate(&mut scene, &mut gpu, &frame).unwrap();
        assert!((cosmos.mode_param() - 8.4).abs() < 1e-5);
        for _ in 0..200 {
            cosmos.animate(&mut scene, &mut gpu, &frame).unwrap();
        }
        assert!((cosmos.mode_param() - 12.0).abs() < 1e-3);
        scene.dispose(&mut gpu);
    }
}
