use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{default_lights, orbit, shaders, SceneFrame, SceneMode};
use crate::modes::RenderMode;
use crate::render::{GpuDevice, Rgba};
use crate::scene::{geometry, InstanceRaw, NodeId, SceneGraph};
use crate::Result;

const RING_COUNT: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq)]
struct RingSeed {
    radius: f32,
    tilt: Quat,
    axis: Vec3,
    phase: f32,
    speed: f32,
    color: Rgba,
}

/// Nested gyroscope of thin tori. Each ring spins on its own axis; bass
/// inflates the inner rings more than the outer ones.
#[derive(Debug, Clone)]
pub struct AetherRings {
    seeds: Vec<RingSeed>,
    instances: Vec<InstanceRaw>,
    node: Option<NodeId>,
    rng: StdRng,
}

impl Default for AetherRings {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            instances: Vec::new(),
            node: None,
            rng: StdRng::seed_from_u64(0x6165_7468),
        }
    }
}

impl SceneMode for AetherRings {
    const MODE: RenderMode = RenderMode::AetherRings;

    fn build(&mut self, scene: &mut SceneGraph, gpu: &mut dyn GpuDevice) -> Result<()> {
        let program = scene.create_program(gpu, "aether-rings", shaders::LIT_INSTANCED)?;
        self.node = Some(scene.add_instanced(
            gpu,
            "rings",
            program,
            &geometry::torus(1.0, 0.025, 6, 64),
            RING_COUNT,
        )?);
        default_lights(scene, Vec3::new(0.0, 10.0, 4.0), Rgba::rgb(1.0, 0.9, 0.8));

        let rng = &mut self.rng;
        self.seeds = (0..RING_COUNT)
            .map(|i| {
                let axis = Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(0.2..1.0),
                    rng.gen_range(-1.0..1.0),
                )
                .normalize_or_zero();
                RingSeed {
                    radius: 1.5 + i as f32 * 0.12,
                    tilt: Quat::from_rotation_x(rng.gen_range(-0.6..0.6)),
                    axis: if axis == Vec3::ZERO { Vec3::Y } else { axis },
                    phase: rng.gen_range(0.0..TAU),
                    speed: rng.gen_range(0.2f32..0.8) * if i % 2 == 0 { 1.0 } else { -1.0 },
                    color: Rgba::hsl(30.0 + i as f32 * 6.0, 0.8, 0.6),
                }
            })
            .collect();
        self.instances = Vec::with_capacity(RING_COUNT);
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
        self.instances.extend(self.seeds.iter().enumerate().map(|(i, seed)| {
            let depth = i as f32 / RING_COUNT as f32;
            let scale = seed.radius * (1.0 + audio.bass * 0.25 * (1.0 - depth * 0.5));
            let spin = Quat::from_axis_angle(seed.axis, time * seed.speed + seed.phase);
            let model = Mat4::from_scale_rotation_translation(
                Vec3::new(scale, 1.0 + audio.treble, scale),
                spin * seed.tilt,
                Vec3::ZERO,
            );
            InstanceRaw::new(model, seed.color.with_alpha(0.7 + audio.mid * 0.3))
        }));
        scene.write_instances(gpu, node, &self.instances)?;
        orbit(scene, time, 0.07, 15.0, 4.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessGpu, Viewport};
    use crate::NormalizedBands;

    #[test]
    fn rings_keep_their_seeds_and_swell_with_bass() {
        let mut gpu = HeadlessGpu::new(64, 64);
        let mut scene = SceneGraph::new(&mut gpu, Viewport::new(64, 64)).unwrap();
        let mut rings = AetherRings::default();
        rings.build(&mut scene, &mut gpu).unwrap();
        let seeds = rings.seeds.clone();

        let mut frame = SceneFrame {
            time: 3.0,
            audio: NormalizedBands::default(),
            beat: false,
        };
        rings.animate(&mut scene, &mut gpu, &frame).unwrap();
        let quiet = Mat4::from_cols_array_2d(&rings.instances[0].model)
            .to_scale_rotation_translation()
            .0;
        frame.audio.bass = 1.0;
        rings.animate(&mut scene, &mut gpu, &frame).unwrap();
        let loud = Mat4::from_cols_array_2d(&rings.instances[0].model)
            .to_scale_rotation_translation()
            .0;

        assert!((loud.x / quiet.x - 1.25).abs() < 1e-3);
        assert_eq!(rings.seeds, seeds);
        scene.dispose(&mut gpu);
    }
}
