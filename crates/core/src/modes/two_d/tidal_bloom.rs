use std::f32::consts::TAU;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::CanvasMode;
use crate::modes::RenderMode;
use crate::reactive::{Accumulator, BandSmoother, Particle, ParticlePool};
use crate::render::{BlendMode, Canvas, ClearPolicy, Rgba, Stroke};
use crate::AudioSnapshot;

const WAVE_POINTS: usize = 64;
const BUBBLE_THRESHOLD: f32 = 100.0;
const BUBBLES_PER_FRAME: usize = 2;
const MAX_BUBBLES: usize = 150;
const BUBBLE_DECAY: f32 = 0.008;

/// Layered ocean swell, one wave per band, with bubbles rising on bass.
#[derive(Debug, Clone)]
pub struct TidalBloom {
    smoother: BandSmoother,
    phase: Accumulator,
    bubbles: ParticlePool,
    rng: StdRng,
}

impl Default for TidalBloom {
    fn default() -> Self {
        Self {
            smoother: BandSmoother::default(),
            phase: Accumulator::new(),
            bubbles: ParticlePool::new(BUBBLE_DECAY, Some(MAX_BUBBLES)),
            rng: StdRng::seed_from_u64(0x7469_6465),
        }
    }
}

impl TidalBloom {
    pub fn bubble_count(&self) -> usize {
        self.bubbles.len()
    }

    fn wave(size: Vec2, layer: usize, level: f32, phase: f32) -> Vec<Vec2> {
        let amplitude = size.y * (0.05 + level / 255.0 * 0.15);
        let frequency = 1.5 + layer as f32;
        let base_y = size.y * (0.55 + layer as f32 * 0.12);
        let shift = phase * (1.0 + layer as f32 * 0.3);
        (0..=WAVE_POINTS)
            .map(|i| {
                let x = i as f32 / WAVE_POINTS as f32 * size.x;
                let y = base_y + (i as f32 / WAVE_POINTS as f32 * frequency * TAU + shift).sin() * amplitude;
                Vec2::new(x, y)
            })
            .collect()
    }
}

impl CanvasMode for TidalBloom {
    const MODE: RenderMode = RenderMode::TidalBloom;

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::Fade { alpha: 0.2 }
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot) {
        self.smoother.update(snapshot);
        let phase = self.phase.advance(0.02, self.smoother.mid / 255.0 * 0.04);
        let size = canvas.size();

        let levels = [self.smoother.bass, self.smoother.mid, self.smoother.treble];
        for (layer, level) in levels.into_iter().enumerate() {
            let crest = Self::wave(size, layer, level, phase);
            let mut body = crest.clone();
            body.push(Vec2::new(size.x, size.y));
            body.push(Vec2::new(0.0, size.y));

            let hue = 190.0 + layer as f32 * 25.0;
            canvas.fill_path(&body, Rgba::hsl(hue, 0.7, 0.35 + layer as f32 * 0.1).with_alpha(0.35));
            canvas.stroke_path(&crest, false, Stroke::new(Rgba::hsl(hue, 0.8, 0.7), 1.5));
        }

        let rng = &mut self.rng;
        self.bubbles.spawn_gated(
            self.smoother.bass,
            BUBBLE_THRESHOLD,
            BUBBLES_PER_FRAME,
            |_| {
                Particle::new(
                    Vec2::new(rng.gen_range(0.0..size.x.max(1.0)), size.y * 0.9),
                    Vec2::new(rng.gen_range(-0.3..0.3), -rng.gen_range(0.5f32..2.0)),
                    rng.gen_range(2.0..6.0),
                    Rgba::hsl(180.0 + rng.gen_range(0.0f32..40.0), 0.6, 0.8),
                )
            },
        );
        self.bubbles.advance(|bubble| {
            bubble.angle += 0.1;
            bubble.position.x += bubble.angle.sin() * 0.3;
        });

        canvas.set_blend(BlendMode::Lighter);
        for bubble in self.bubbles.particles() {
            canvas.stroke_circle(
                bubble.position,
                bubble.size,
                Stroke::new(bubble.color.with_alpha(bubble.life), 1.0),
            );
            canvas.fill_circle(
                bubble.position - Vec2::splat(bubble.size * 0.3),
                bubble.size * 0.25,
                Rgba::WHITE.with_alpha(bubble.life * 0.6),
            );
        }
        canvas.set_blend(BlendMode::SourceOver);
    }
}
