use std::f32::consts::TAU;

use glam::Vec2;

use super::CanvasMode;
use crate::modes::RenderMode;
use crate::reactive::{Accumulator, BandSmoother, BeatDetector};
use crate::render::{Canvas, ClearPolicy, Rgba, Stroke};
use crate::AudioSnapshot;

const SPIKES: usize = 180;
const PULSE_DECAY: f32 = 0.9;

/// Radial spectrum around a core that breathes with the bass.
#[derive(Debug, Clone, Default)]
pub struct Circular {
    smoother: BandSmoother,
    beat: BeatDetector,
    rotation: Accumulator,
    pulse: f32,
}

impl Circular {
    pub fn rotation(&self) -> f32 {
        self.rotation.value()
    }

    pub fn pulse(&self) -> f32 {
        self.pulse
    }
}

impl CanvasMode for Circular {
    const MODE: RenderMode = RenderMode::Circular;

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::Full
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot) {
        self.smoother.update(snapshot);
        if self.beat.detect(snapshot.bass_energy) {
            self.pulse = 1.0;
        } else {
            self.pulse *= PULSE_DECAY;
        }
        let rotation = self
            .rotation
            .advance(0.005, snapshot.mid_energy / 255.0 * 0.01);

        let size = canvas.size();
        let center = size * 0.5;
        let span = size.min_element();
        let base = span * 0.2 + self.smoother.bass / 255.0 * span * 0.1 + self.pulse * span * 0.05;

        canvas.fill_circle(
            center,
            base * 0.9,
            Rgba::hsl(
                200.0 + self.smoother.treble / 255.0 * 160.0,
                0.7,
                0.15 + self.pulse * 0.2,
            ),
        );

        let usable = (snapshot.frequency_bins.len() as f32 * 0.7) as usize;
        for i in 0..SPIKES {
            let angle = rotation + i as f32 / SPIKES as f32 * TAU;
            let direction = Vec2::new(angle.cos(), angle.sin());
            let level = snapshot.bin(i * usable / SPIKES);
            let length = level * span * 0.25;
            if length <= 0.0 {
                continue;
            }
            canvas.stroke_line(
                center + direction * base,
                center + direction * (base + length),
                Stroke::new(
                    Rgba::hsl(i as f32 / SPIKES as f32 * 360.0 + rotation.to_degrees(), 0.9, 0.55),
                    2.0,
                ),
            );
        }

        if self.pulse > 0.05 {
            canvas.stroke_circle(
                center,
                base * (1.0 + self.pulse * 0.4),
                Stroke::new(Rgba::WHITE.with_alpha(self.pulse), 3.0),
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
    fn rotation_grows_with_mid_energy() {
        let mut quiet = Circular::default();
        let mut loud = Circular::default();
        let mut canvas = DisplayList::new(200, 200);

        for _ in 0..10 {
            quiet.draw(&mut canvas, &testing::silence());
            loud.draw(&mut canvas, &testing::snapshot(0, 255, 0));
        }
        assert!((quiet.rotation() - 0.05).abs() < 1e-5);
        assert!((loud.rotation() - 0.15).abs() < 1e-4);
    }

    #[test]
    fn beat_sets_pulse_then_decays() {
        let mut mode = Circular::default();
        let mut canvas = DisplayList::new(200, 200);
        mode.draw(&mut canvas, &testing::snapshot(50, 0, 0));
        mode.draw(&mut canvas, &testing::snapshot(180, 0, 0));
        assert_eq!(mode.pulse(), 1.0);
        mode.draw(&mut canvas, &testing::snapshot(180, 0, 0));
        assert!((mode.pulse() - PULSE_DECAY).abs() < 1e-6);
    }
}
