use std::f32::consts::TAU;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{glow_sprite, orbit, shaders, SceneFrame, SceneMode};
use crate::modes::RenderMode;
use crate::render::{GpuDevice, Rgba};
use crate::scene::{NodeId, PointRaw, SceneGraph};
use crate::Result;

const STAR_COUNT: usize = 4000;
const ARMS: usize = 4;
const MAX_RADIUS: f32 = 10.0;
/// Radians of arm twist per unit of radius.
const TWIST: f32 = 0.45;

#[derive(Debug, Clone, Copy, PartialEq)]
struct StarSeed {
    radius: f32,
    arm_angle: f32,
    phase: f32,
    height: f32,
    scatter: Vec3,
    size: f32,
    color: Rgba,
}

/// Spiral galaxy of point sprites. Inner stars orbit faster; bass pushes
/// the whole disc outwards.
#[derive(Debug, Clone)]
pub struct ParticleGalaxy {
    seeds: Vec<StarSeed>,
    points: Vec<PointRaw>,
    node: Option<NodeId>,
    rng: StdRng,
}

impl Default for ParticleGalaxy {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            points: Vec::new(),
            node: None,
            rng: StdRng::seed_from_u64(0x6761_6c61),
        }
    }
}

impl ParticleGalaxy {
    fn seed_stars(&mut self) {
        let rng = &mut self.rng;
        self.seeds = (0..STAR_COUNT)
            .map(|i| {
                let radius = rng.gen::<f32>().powf(0.6) * MAX_RADIUS + 0.3;
                let core = 1.0 - radius / (MAX_RADIUS + 0.3);
                StarSeed {
                    radius,
                    arm_angle: (i % ARMS) as f32 / ARMS as f32 * TAU,
                    phase: rng.gen_range(-0.3f32..0.3),
                    height: rng.gen_range(-0.4f32..0.4) * core,
                    scatter: Vec3::new(rng.gen_range(-0.4..0.4), 0.0, rng.gen_range(-0.4..0.4)),
                    size: rng.gen_range(0.4f32..1.4),
                    color: Rgba::hsl(220.0 - core * 180.0 + rng.gen_range(0.0f32..30.0), 0.8, 0.55 + core * 0.3),
                }
            })
            .collect();
    }
}

impl SceneMode for ParticleGalaxy {
    const MODE: RenderMode = RenderMode::ParticleGalaxy;

    fn build(&mut self, scene: &mut SceneGraph, gpu: &mut dyn GpuDevice) -> Result<()> {
        let program = scene.create_program(gpu, "particle-galaxy", shaders::POINT_SPRITES)?;
        let sprite = glow_sprite(scene, gpu, "galaxy-sprite", 32)?;
        self.node = Some(scene.add_points(gpu, "galaxy-stars", program, STAR_COUNT, vec![sprite])?);
        self.seed_stars();
        self.points = vec![bytemuck::Zeroable::zeroed(); STAR_COUNT];
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
        let audio = frame.audio;
        let swirl = frame.time * 0.3;
        let expand = 1.0 + audio.bass * 0.35;

        for (seed, point) in self.seeds.iter().zip(self.points.iter_mut()) {
            let angle = seed.arm_angle + seed.radius * TWIST + seed.phase
                + swirl / (0.5 + seed.radius * 0.2);
            let radius = seed.radius * expand;
            let position = Vec3::new(
                angle.cos() * radius,
                seed.height * (1.0 + audio.mid),
                angle.sin() * radius,
            ) + seed.scatter;
            *point = PointRaw {
                position: position.to_array(),
                size: seed.size * (1.0 + audio.treble * 0.8),
                color: seed.color.with_alpha(0.6 + audio.rms * 0.4).to_array(),
            };
        }
        scene.write_points(gpu, node, &self.points)?;
        orbit(scene, frame.time, 0.05, 16.0, 6.0 + audio.bass * 2.0);
        Ok(())
    }
}
