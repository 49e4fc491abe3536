use glam::Vec2;

use super::CanvasMode;
use crate::modes::RenderMode;
use crate::reactive::BandSmoother;
use crate::render::{Canvas, ClearPolicy, Rgba, Stroke};
use crate::AudioSnapshot;

/// Oscilloscope. Redrawn from scratch every frame so the trace stays crisp.
#[derive(Debug, Clone, Default)]
pub struct Waveform {
    smoother: BandSmoother,
}

impl CanvasMode for Waveform {
    const MODE: RenderMode = RenderMode::Waveform;

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::Full
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot) {
        self.smoother.update(snapshot);
        let size = canvas.size();
        let mid_y = size.y * 0.5;
        let amplitude = size.y * 0.5 * 0.8;

        let samples = &snapshot.time_domain_samples;
        let trace: Vec<Vec2> = if samples.len() < 2 {
            vec![Vec2::new(0.0, mid_y), Vec2::new(size.x, mid_y)]
        } else {
            let last = (samples.len() - 1) as f32;
            samples
                .iter()
                .enumerate()
                .map(|(i, &sample)| {
                    let offset = sample as f32 / 128.0 - 1.0;
                    Vec2::new(i as f32 / last * size.x, mid_y + offset * amplitude)
                })
                .collect()
        };
        let ghost: Vec<Vec2> = trace
            .iter()
            .map(|point| Vec2::new(point.x, 2.0 * mid_y - point.y))
            .collect();

        let color = Rgba::hsl(180.0 + self.smoother.treble / 255.0 * 120.0, 0.9, 0.6);
        let width = 2.0 + snapshot.rms / 255.0 * 3.0;

        canvas.stroke_path(&ghost, false, Stroke::new(color.with_alpha(0.25), width * 0.5));
        canvas.stroke_path(&trace, false, Stroke::new(color, width));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::two_d::testing;
    use crate::render::{DisplayList, DrawCommand};

    #[test]
    fn trace_follows_every_sample() {
        let mut mode = Waveform::default();
        let mut canvas = DisplayList::new(400, 200);
        mode.draw(&mut canvas, &testing::snapshot(10, 10, 10));

        match canvas.commands().last() {
            Some(DrawCommand::Path { points, stroke, .. }) => {
                assert_eq!(points.len(), 1024);
                assert!(stroke.width > 2.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_snapshot_draws_flat_line() {
        let mut mode = Waveform::default();
        let mut canvas = DisplayList::new(400, 200);
        mode.draw(&mut canvas, &AudioSnapshot::empty());

        match canvas.commands().last() {
            Some(DrawCommand::Path { points, stroke, .. }) => {
                assert!(points.iter().all(|p| p.y == 100.0));
                assert_eq!(stroke.width, 2.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
