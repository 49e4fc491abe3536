use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{default_lights, orbit, shaders, SceneFrame, SceneMode};
use crate::modes::RenderMode;
use crate::render::{GpuDevice, Rgba};
use crate::scene::{geometry, InstanceRaw, NodeId, SceneGraph};
use crate::Result;

const SHARD_COUNT: usize = 300;
const FIELD: Vec3 = Vec3::new(8.0, 4.0, 8.0);

#[derive(Debug, Clone, Copy, PartialEq)]
struct ShardSeed {
    position: Vec3,
    axis: Vec3,
    phase: f32,
    color: Rgba,
}

/// Field of glassy shards spinning in place; treble makes them float.
#[derive(Debug, Clone)]
pub struct PrismShardField {
    seeds: Vec<ShardSeed>,
    instances: Vec<InstanceRaw>,
    node: Option<NodeId>,
    rng: StdRng,
}

impl Default for PrismShardField {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            instances: Vec::new(),
            node: None,
            rng: StdRng::seed_from_u64(0x7072_6973),
        }
    }
}

impl SceneMode for PrismShardField {
    const MODE: RenderMode = RenderMode::PrismShardField;

    fn build(&mut self, scene: &mut SceneGraph, gpu: &mut dyn GpuDevice) -> Result<()> {
        let program = scene.create_program(gpu, "prism-shard-field", shaders::LIT_INSTANCED)?;
        self.node = Some(scene.add_instanced(
            gpu,
            "shards",
            program,
            &geometry::shard(1.0, 0.22),
            SHARD_COUNT,
        )?);
        default_lights(scene, Vec3::new(-5.0, 9.0, 5.0), Rgba::rgb(0.9, 0.95, 1.0));

        let rng = &mut self.rng;
        self.seeds = (0..SHARD_COUNT)
            .map(|_| {
                let axis = Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                )
                .try_normalize()
                .unwrap_or(Vec3::Y);
                ShardSeed {
                    position: Vec3::new(
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    ) * FIELD,
                    axis,
                    phase: rng.gen_range(0.0..TAU),
                    color: Rgba::hsl(rng.gen_range(160.0f32..320.0), 0.6, 0.65),
                }
            })
            .collect();
        self.instances = Vec::with_capacity(SHARD_COUNT);
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
            let spin = time * (1.0 + audio.treble * 3.0) + seed.phase;
            let lift = (time * 1.5 + seed.phase).sin() * 0.3 + audio.treble * 0.8 * seed.phase.sin();
            let model = Mat4::from_scale_rotation_translation(
                Vec3::splat(0.6 + audio.mid * 0.4),
                Quat::from_axis_angle(seed.axis, spin),
                seed.position + Vec3::Y * lift,
            );
            InstanceRaw::new(model, seed.color.with_alpha(0.55 + audio.rms * 0.45))
        }));
        scene.write_instances(gpu, node, &self.instances)?;
        orbit(scene, time, 0.06, 17.0, 3.0 + audio.bass * 1.5);
        Ok(())
    }
}
