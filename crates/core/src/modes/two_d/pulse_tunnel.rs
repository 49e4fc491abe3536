use std::f32::consts::TAU;

use glam::Vec2;

use super::CanvasMode;
use crate::modes::RenderMode;
use crate::reactive::{Accumulator, BandSmoother, BeatDetector};
use crate::render::{Canvas, ClearPolicy, Rgba, Stroke};
use crate::AudioSnapshot;

const SPAWN_INTERVAL: u64 = 12;
const START_DEPTH: f32 = 4.0;
const MIN_DEPTH: f32 = 0.05;
const MAX_RINGS: usize = 64;
const SIDES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ring {
    depth: f32,
    hue: f32,
    strength: f32,
}

/// Hexagonal rings fly toward the viewer, faster with more bass. New rings
/// appear on a fixed cadence and on every beat.
#[derive(Debug, Clone, Default)]
pub struct PulseTunnel {
    rings: Vec<Ring>,
    smoother: BandSmoother,
    beat: BeatDetector,
    twist: Accumulator,
    frame: u64,
}

impl PulseTunnel {
    pub fn ring_count(&self) -> usize {
        self.rings.len()
    }

    fn step_rings(&mut self, snapshot: &AudioSnapshot) {
        let beat = self.beat.detect(snapshot.bass_energy);
        self.frame += 1;

        let speed = 0.02 + snapshot.bass_energy / 255.0 * 0.05;
        for ring in &mut self.rings {
            ring.depth -= speed;
        }
        self.rings.retain(|ring| ring.depth > MIN_DEPTH);

        if (self.frame % SPAWN_INTERVAL == 0 || beat) && self.rings.len() < MAX_RINGS {
            self.rings.push(Ring {
                depth: START_DEPTH,
                hue: self.twist.value() * 40.0 + self.frame as f32 * 3.0,
                strength: if beat {
                    1.0
                } else {
                    0.4 + self.smoother.mid / 255.0 * 0.4
                },
            });
        }
    }
}

impl CanvasMode for PulseTunnel {
    const MODE: RenderMode = RenderMode::PulseTunnel;

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::Fade { alpha: 0.25 }
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot) {
        self.smoother.update(snapshot);
        self.step_rings(snapshot);
        let twist = self
            .twist
            .advance(0.01, snapshot.treble_energy / 255.0 * 0.03);

        let size = canvas.size();
        let center = size * 0.5;
        let span = size.min_element();
        let limit = size.length();

        // Newest rings are the deepest; draw them first.
        for ring in self.rings.iter().rev() {
            let scale = 1.0 / ring.depth;
            let radius = span * 0.12 * scale;
            if radius > limit {
                continue;
            }
            let sway = (1.0 - scale.min(1.0)) * span * 0.05;
            let offset = Vec2::new((twist + ring.depth).cos(), (twist + ring.depth).sin()) * sway;
            let points: Vec<Vec2> = (0..SIDES)
                .map(|side| {
                    let angle = twist * 0.5 + side as f32 / SIDES as f32 * TAU;
                    center + offset + Vec2::new(angle.cos(), angle.sin()) * radius
                })
                .collect();
            let alpha = ring.strength * (scale * 0.5).min(1.0);
            canvas.stroke_path(
                &points,
                true,
                Stroke::new(Rgba::hsl(ring.hue, 0.9, 0.5).with_alpha(alpha), 1.0 + scale * 1.5),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::two_d::testing;
    use crate::render::DisplayList;

    #[test]
    fn rings_spawn_on_cadence_and_expire() {
        let mut mode = PulseTunnel::default();
        let mut canvas = DisplayList::new(200, 200);
        for _ in 0..SPAWN_INTERVAL {
            mode.draw(&mut canvas, &testing::silence());
        }
        assert_eq!(mode.ring_count(), 1);

        // At silence a ring needs (4.0 - 0.05) / 0.02 frames to arrive.
        for _ in 0..400 {
            mode.draw(&mut canvas, &testing::silence());
            assert!(mode.rings.iter().all(|ring| ring.depth > MIN_DEPTH));
        }
        assert!(mode.ring_count() < 20);
    }

    #[test]
    fn beats_spawn_extra_rings_up_to_the_cap() {
        let mut mode = PulseTunnel::default();
        let mut canvas = DisplayList::new(200, 200);
        for frame in 0..2_000 {
            let bass = if frame % 2 == 0 { 40 } else { 250 };
            mode.draw(&mut canvas, &testing::snapshot(bass, 0, 0));
            assert!(mode.ring_count() <= MAX_RINGS);
        }
        assert!(mode.ring_count() > 5);
    }
}
