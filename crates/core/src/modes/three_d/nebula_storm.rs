use std::f32::consts::TAU;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{glow_sprite, orbit, shaders, SceneFrame, SceneMode};
use crate::modes::RenderMode;
use crate::render::{GpuDevice, Rgba};
use crate::scene::{NodeId, PointRaw, SceneGraph};
use crate::Result;

const MOTE_COUNT: usize = 3000;
const FLASH_DECAY: f32 = 0.88;
const CLOUD_RADIUS: f32 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Mote {
    origin: Vec3,
    frequency: Vec3,
    phase: f32,
    size: f32,
    color: Rgba,
}

/// Turbulent gas cloud of point sprites. Treble shakes individual motes and
/// every beat flashes the whole cloud.
#[derive(Debug, Clone)]
pub struct NebulaStorm {
    motes: Vec<Mote>,
    points: Vec<PointRaw>,
    node: Option<NodeId>,
    flash: f32,
    rng: StdRng,
}

impl Default for NebulaStorm {
    fn default() -> Self {
        Self {
            motes: Vec::new(),
            points: Vec::new(),
            node: None,
            flash: 0.0,
            rng: StdRng::seed_from_u64(0x6e65_6275),
        }
    }
}

impl NebulaStorm {
    pub fn flash(&self) -> f32 {
        self.flash
    }
}

impl SceneMode for NebulaStorm {
    const MODE: RenderMode = RenderMode::NebulaStorm;

    fn build(&mut self, scene: &mut SceneGraph, gpu: &mut dyn GpuDevice) -> Result<()> {
        let program = scene.create_program(gpu, "nebula-storm", shaders::POINT_SPRITES)?;
        let sprite = glow_sprite(scene, gpu, "nebula-sprite", 64)?;
        self.node = Some(scene.add_points(gpu, "nebula-motes", program, MOTE_COUNT, vec![sprite])?);

        let rng = &mut self.rng;
        self.motes = (0..MOTE_COUNT)
            .map(|_| {
                // Uniform direction, radius biased to the core.
                let theta = rng.gen_range(0.0..TAU);
                let z: f32 = rng.gen_range(-1.0..1.0);
                let ring = (1.0 - z * z).sqrt();
                let radius = rng.gen::<f32>().cbrt() * CLOUD_RADIUS;
                Mote {
                    origin: Vec3::new(ring * theta.cos(), z * 0.6, ring * theta.sin()) * radius,
                    frequency: Vec3::new(
                        rng.gen_range(0.2..0.9),
                        rng.gen_range(0.2..0.9),
                        rng.gen_range(0.2..0.9),
                    ),
                    phase: rng.gen_range(0.0..TAU),
                    size: rng.gen_range(1.0f32..3.0),
                    color: Rgba::hsl(
                        260.0 + radius / CLOUD_RADIUS * 80.0 + rng.gen_range(0.0f32..20.0),
                        0.7,
                        0.5,
                    ),
                }
            })
            .collect();
        self.points = vec![bytemuck::Zeroable::zeroed(); MOTE_COUNT];
        Ok(())
    }

    fn animate(
        &mut self,
        scene: &mut SceneGraph,
        gpu: &mut dyn GpuDevice,
        frame: &SceneFrame,
    ) -> Result<()> {
        let Some(node) = self.node else {
            return Ok(());
        };
        if frame.beat {
            self.flash = 1.0;
        } else {
            self.flash *= FLASH_DECAY;
        }

        let audio = frame.audio;
        let time = frame.time;
        let churn = 0.6 * (1.0 + audio.bass);
        let jitter = audio.treble * 0.3;
        let rng = &mut self.rng;

        for (mote, point) in self.motes.iter().zip(self.points.iter_mut()) {
            let t = time * mote.frequency + Vec3::splat(mote.phase);
            let turbulence = Vec3::new(t.y.sin(), t.z.cos(), t.x.sin()) * churn;
            let shake = if jitter > 0.0 {
                Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ) * jitter
            } else {
                Vec3::ZERO
            };
            *point = PointRaw {
                position: (mote.origin + turbulence + shake).to_array(),
                size: mote.size * (1.0 + audio.mid * 0.5),
                color: mote.color.with_alpha(0.35 + audio.rms * 0.5).to_array(),
            };
        }
        scene.write_points(gpu, node, &self.points)?;
        orbit(scene, time, 0.04, 18.0, 3.0 + (time * 0.2).sin() * 2.0);
        Ok(())
    }

    fn mode_param(&self) -> f32 {
        self.flash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessGpu, Viewport};
    use crate::NormalizedBands;

    #[test]
    fn beat_flash_decays() {
        let mut gpu = HeadlessGpu::new(64, 64);
        let mut scene = SceneGraph::new(&mut gpu, Viewport::new(64, 64)).unwrap();
        let mut nebula = NebulaStorm::default();
        nebula.build(&mut scene, &mut gpu).unwrap();
        assert_eq!(gpu.live_textures(), 1);

        let mut frame = SceneFrame {
            time: 0.5,
            audio: NormalizedBands::default(),
            beat: true,
        };
        nebula.animate(&mut scene, &mut gpu, &frame).unwrap();
        assert_eq!(nebula.mode_param(), 1.0);
        frame.beat = false;
        nebula.animate(&mut scene, &mut gpu, &frame).unwrap();
        assert!((nebula.flash() - FLASH_DECAY).abs() < 1e-6);
        scene.dispose(&mut gpu);
    }

    #[test]
    fn silence_is_deterministic() {
        let mut gpu = HeadlessGpu::new(64, 64);
        let mut scene = SceneGraph::new(&mut gpu, Viewport::new(64, 64)).unwrap();
        let mut nebula = NebulaStorm::default();
        nebula.build(&mut scene, &mut gpu).unwrap();
        let frame = SceneFrame {
            time: 2.0,
            audio: NormalizedBands::default(),
            beat: false,
        };
        nebula.animate(&mut scene, &mut gpu, &frame).unwrap();
        let first = nebula.points.clone();
        nebula.animate(&mut scene, &mut gpu, &frame).unwrap();
        assert_eq!(nebula.points, first, "no treble, no jitter");
        scene.dispose(&mut gpu);
    }
}
