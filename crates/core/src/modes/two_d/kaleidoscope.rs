use std::f32::consts::TAU;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::CanvasMode;
use crate::modes::RenderMode;
use crate::reactive::{Accumulator, BandSmoother, Particle, ParticlePool};
use crate::render::{BlendMode, Canvas, ClearPolicy, Rgba, Stroke};
use crate::AudioSnapshot;

const ARMS: usize = 8;
const PETALS: usize = 12;
const SPARK_THRESHOLD: f32 = 110.0;
const SPARKS_PER_FRAME: usize = 3;
const MAX_SPARKS: usize = 200;
const SPARK_DECAY: f32 = 0.02;

/// Eight-fold mirrored petals with treble sparks. Everything lives in
/// arm-local coordinates so each arm is the same drawing rotated.
#[derive(Debug, Clone)]
pub struct Kaleidoscope {
    smoother: BandSmoother,
    rotation: Accumulator,
    hue: Accumulator,
    sparks: ParticlePool,
    rng: StdRng,
}

impl Default for Kaleidoscope {
    fn default() -> Self {
        Self {
            smoother: BandSmoother::default(),
            rotation: Accumulator::new(),
            hue: Accumulator::new(),
            sparks: ParticlePool::new(SPARK_DECAY, Some(MAX_SPARKS)),
            rng: StdRng::seed_from_u64(0x6b61_6c65),
        }
    }
}

impl Kaleidoscope {
    pub fn spark_count(&self) -> usize {
        self.sparks.len()
    }

    fn draw_arm(&self, canvas: &mut dyn Canvas, index: usize, petals: &[(f32, f32)], hue: f32) {
        canvas.save();
        canvas.rotate(index as f32 * TAU / ARMS as f32);

        let outline: Vec<Vec2> = petals
            .iter()
            .map(|&(distance, size)| Vec2::new(distance, size * 0.5))
            .chain(petals.iter().rev().map(|&(distance, size)| Vec2::new(distance, -size * 0.5)))
            .collect();
        canvas.stroke_path(
            &outline,
            true,
            Stroke::new(Rgba::hsl(hue + 180.0, 0.6, 0.6).with_alpha(0.5), 1.0),
        );

        for (k, &(distance, size)) in petals.iter().enumerate() {
            canvas.fill_circle(
                Vec2::new(distance, 0.0),
                size,
                Rgba::hsl(hue + k as f32 * 20.0, 0.85, 0.5).with_alpha(0.6),
            );
        }

        for spark in self.sparks.particles() {
            canvas.fill_circle(
                spark.position,
                spark.size * spark.life,
                spark.color.with_alpha(spark.life),
            );
        }
        canvas.restore();
    }
}

impl CanvasMode for Kaleidoscope {
    const MODE: RenderMode = RenderMode::Kaleidoscope;

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::Fade { alpha: 0.15 }
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot) {
        self.smoother.update(snapshot);
        let rotation = self
            .rotation
            .advance(0.005, snapshot.mid_energy / 255.0 * 0.01);
        let hue = self.hue.advance(0.5, self.smoother.treble / 255.0 * 2.0);

        let size = canvas.size();
        let radius = size.min_element() * 0.45;

        let rng = &mut self.rng;
        let treble = snapshot.treble_energy;
        self.sparks
            .spawn_gated(treble, SPARK_THRESHOLD, SPARKS_PER_FRAME, |_| {
                let angle = rng.gen_range(-0.5f32..0.5) * TAU / ARMS as f32;
                let distance = rng.gen_range(0.0..radius * 0.3 + 1.0);
                let direction = Vec2::new(angle.cos(), angle.sin());
                let speed = rng.gen_range(1.0f32..3.0) + treble / 255.0 * 3.0;
                Particle::new(
                    direction * distance,
                    direction * speed,
                    rng.gen_range(1.0..3.0),
                    Rgba::hsl(hue + rng.gen_range(0.0f32..60.0), 0.9, 0.7),
                )
            });
        self.sparks.advance(|spark| spark.velocity *= 0.98);

        let petals: Vec<(f32, f32)> = snapshot
            .band_slice(PETALS, 0.6)
            .into_iter()
            .enumerate()
            .map(|(k, level)| {
                let distance = (k + 1) as f32 / PETALS as f32 * radius;
                (distance, 4.0 + level * radius * 0.12)
            })
            .collect();

        canvas.translate(size * 0.5);
        canvas.rotate(rotation);
        canvas.set_blend(BlendMode::Lighter);
        for index in 0..ARMS {
            self.draw_arm(canvas, index, &petals, hue);
        }
        canvas.set_blend(BlendMode::SourceOver);
    }
}
