use std::f32::consts::TAU;

use glam::{EulerRot, Mat4, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{default_lights, orbit, shaders, SceneFrame, SceneMode};
use crate::modes::RenderMode;
use crate::render::{GpuDevice, Rgba};
use crate::scene::{geometry, InstanceRaw, NodeId, SceneGraph};
use crate::Result;

const SIDE: usize = 8;
const COUNT: usize = SIDE * SIDE * SIDE;
const SPACING: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
struct CrystalSeed {
    base: Vec3,
    phase: f32,
    color: Rgba,
}

/// 8x8x8 block of octahedra breathing and spinning with the mids.
#[derive(Debug, Clone)]
pub struct CrystalLattice {
    seeds: Vec<CrystalSeed>,
    instances: Vec<InstanceRaw>,
    node: Option<NodeId>,
    rng: StdRng,
}

impl Default for CrystalLattice {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            instances: Vec::new(),
            node: None,
            rng: StdRng::seed_from_u64(0x6372_7973),
        }
    }
}

impl SceneMode for CrystalLattice {
    const MODE: RenderMode = RenderMode::CrystalLattice;

    fn build(&mut self, scene: &mut SceneGraph, gpu: &mut dyn GpuDevice) -> Result<()> {
        let program = scene.create_program(gpu, "crystal-lattice", shaders::LIT_INSTANCED)?;
        self.node = Some(scene.add_instanced(
            gpu,
            "crystals",
            program,
            &geometry::octahedron(0.35),
            COUNT,
        )?);
        default_lights(scene, Vec3::new(6.0, 8.0, 6.0), Rgba::rgb(0.8, 0.9, 1.0));

        let offset = (SIDE - 1) as f32 * 0.5;
        let rng = &mut self.rng;
        self.seeds = (0..COUNT)
            .map(|i| {
                let (x, y, z) = (i % SIDE, (i / SIDE) % SIDE, i / (SIDE * SIDE));
                CrystalSeed {
                    base: (Vec3::new(x as f32, y as f32, z as f32) - Vec3::splat(offset)) * SPACING,
                    phase: rng.gen_range(0.0..TAU),
                    color: Rgba::hsl(180.0 + rng.gen_range(0.0f32..80.0), 0.7, 0.55),
                }
            })
            .collect();
        self.instances = Vec::with_capacity(COUNT);
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
        let time = frame.time;

        self.instances.clear();
        self.instances.extend(self.seeds.iter().map(|seed| {
            let scale = 0.6 + audio.mid * 0.8 + (time * 2.0 + seed.phase).sin() * 0.1;
            let spin = time * (1.0 + audio.mid * 2.0) + seed.phase;
            let model = Mat4::from_scale_rotation_translation(
                Vec3::splat(scale.max(0.05)),
                Quat::from_euler(EulerRot::YXZ, spin, spin * 0.5, 0.0),
                seed.base * (1.0 + audio.bass * 0.15),
            );
            let glow = 0.8 + audio.treble * 0.6;
            let color = Rgba::rgba(
                seed.color.r * glow,
                seed.color.g * glow,
                seed.color.b * glow,
                1.0,
            );
            InstanceRaw::new(model, color)
        }));
        scene.write_instances(gpu, node, &self.instances)?;
        orbit(scene, time, 0.1, 14.0, 5.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessGpu, Viewport};
    use crate::NormalizedBands;

    #[test]
    fn mids_scale_the_crystals() {
        let mut gpu = HeadlessGpu::new(64, 64);
        let mut scene = SceneGraph::new(&mut gpu, Viewport::new(64, 64)).unwrap();
        let mut lattice = CrystalLattice::default();
        lattice.build(&mut scene, &mut gpu).unwrap();
        assert_eq!(lattice.seeds.len(), 512);

        let scale_of = |instance: &InstanceRaw| {
            Mat4::from_cols_array_2d(&instance.model)
                .to_scale_rotation_translation()
                .0
                .x
        };
        let mut frame = SceneFrame {
            time: 0.0,
            audio: NormalizedBands::default(),
            beat: false,
        };
        lattice.animate(&mut scene, &mut gpu, &frame).unwrap();
        let quiet = scale_of(&lattice.instances[0]);
        frame.audio.mid = 1.0;
        lattice.animate(&mut scene, &mut gpu, &frame).unwrap();
        assert!((scale_of(&lattice.instances[0]) - quiet - 0.8).abs() < 1e-3);
        scene.dispose(&mut gpu);
    }
}
