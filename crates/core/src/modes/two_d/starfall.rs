use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::CanvasMode;
use crate::modes::RenderMode;
use crate::reactive::{Accumulator, BandSmoother, Particle, ParticlePool};
use crate::render::{BlendMode, Canvas, ClearPolicy, Rgba, Stroke};
use crate::AudioSnapshot;

const SPAWN_THRESHOLD: f32 = 90.0;
const STARS_PER_FRAME: usize = 4;
const MAX_STARS: usize = 300;
const STAR_DECAY: f32 = 0.01;
const GRAVITY: f32 = 0.05;

/// Treble-driven meteor shower falling under gravity.
#[derive(Debug, Clone)]
pub struct Starfall {
    stars: ParticlePool,
    smoother: BandSmoother,
    drift: Accumulator,
    rng: StdRng,
}

impl Default for Starfall {
    fn default() -> Self {
        Self {
            stars: ParticlePool::new(STAR_DECAY, Some(MAX_STARS)),
            smoother: BandSmoother::default(),
            drift: Accumulator::new(),
            rng: StdRng::seed_from_u64(0x7374_6172),
        }
    }
}

impl Starfall {
    pub fn star_count(&self) -> usize {
        self.stars.len()
    }
}

impl CanvasMode for Starfall {
    const MODE: RenderMode = RenderMode::Starfall;

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::Fade { alpha: 0.3 }
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot) {
        self.smoother.update(snapshot);
        let size = canvas.size();
        let bass = snapshot.bass_energy;

        let rng = &mut self.rng;
        self.stars.spawn_gated(
            snapshot.treble_energy,
            SPAWN_THRESHOLD,
            STARS_PER_FRAME,
            |_| {
                Particle::new(
                    Vec2::new(rng.gen_range(0.0..size.x.max(1.0)), -5.0),
                    Vec2::new(
                        rng.gen_range(-0.5..0.5),
                        1.0 + rng.gen_range(0.0f32..2.0) + bass / 255.0 * 3.0,
                    ),
                    rng.gen_range(1.0..3.0),
                    Rgba::hsl(200.0 + rng.gen_range(0.0f32..60.0), 0.8, 0.75),
                )
            },
        );

        let sway = self.drift.advance(0.01, self.smoother.mid / 255.0 * 0.02).sin() * 0.02;
        self.stars.advance(|star| {
            star.velocity.y += GRAVITY;
            star.velocity.x += sway;
            if star.position.y > size.y {
                star.life = 0.0;
            }
        });

        canvas.set_blend(BlendMode::Lighter);
        for star in self.stars.particles() {
            canvas.stroke_line(
                star.position - star.velocity * 3.0,
                star.position,
                Stroke::new(star.color.with_alpha(star.life * 0.5), star.size * 0.5),
            );
            canvas.fill_circle(
                star.position,
                star.size * (0.5 + star.life * 0.5),
                star.color.with_alpha(star.life),
            );
        }
        canvas.set_blend(BlendMode::SourceOver);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::two_d::testing;
    use crate::render::DisplayList;

    #[test]
    fn quiet_treble_spawns_nothing() {
        let mut mode = Starfall::default();
        let mut canvas = DisplayList::new(300, 200);
        for _ in 0..50 {
            mode.draw(&mut canvas, &testing::snapshot(255, 255, 90));
        }
        assert_eq!(mode.star_count(), 0);
    }

    #[test]
    fn stars_are_capped_and_leave_the_screen() {
        let mut mode = Starfall::default();
        let mut canvas = DisplayList::new(300, 200);
        for _ in 0..400 {
            canvas.begin_frame();
            mode.draw(&mut canvas, &testing::snapshot(0, 0, 255));
            assert!(mode.star_count() <= MAX_STARS);
        }
        assert!(mode.star_count() > 0);
        for star in mode.stars.particles() {
            assert!(star.position.y <= 200.0);
        }

        for _ in 0..200 {
            mode.draw(&mut canvas, &testing::silence());
        }
        assert_eq!(mode.star_count(), 0);
    }
}
