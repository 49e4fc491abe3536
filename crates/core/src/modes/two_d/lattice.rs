use glam::Vec2;

use super::CanvasMode;
use crate::modes::RenderMode;
use crate::reactive::HistoryBuffer;
use crate::render::{Canvas, ClearPolicy, Rgba, Stroke};
use crate::AudioSnapshot;

const SLICES: usize = 40;
const BANDS: usize = 32;
const DEPTH_STEP: f32 = 0.35;
/// Every n-th band also gets a line running back through the slices.
const RIB_SPACING: usize = 4;

/// Scrolling spectral terrain: each frame pushes a slice at the front and
/// older slices recede toward the horizon.
#[derive(Debug, Clone)]
pub struct Lattice {
    history: HistoryBuffer<Vec<f32>>,
}

impl Default for Lattice {
    fn default() -> Self {
        Self {
            history: HistoryBuffer::new(SLICES),
        }
    }
}

impl Lattice {
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn project(size: Vec2, age: usize, band: usize, level: f32) -> Vec2 {
        let depth = 1.0 + age as f32 * DEPTH_STEP;
        let scale = 1.0 / depth;
        let horizon = size.y * 0.35;
        let floor = size.y * 0.9;

        let x = (band as f32 / (BANDS - 1) as f32 - 0.5) * size.x * 1.6;
        let height = level * size.y * 0.5;
        Vec2::new(
            size.x * 0.5 + x * scale,
            horizon + (floor - horizon) * scale - height * scale,
        )
    }
}

impl CanvasMode for Lattice {
    const MODE: RenderMode = RenderMode::Lattice;

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::Full
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot) {
        self.history.push(snapshot.band_slice(BANDS, 0.5));
        let size = canvas.size();

        let rows: Vec<(usize, Vec<Vec2>)> = self
            .history
            .iter_by_age()
            .map(|(age, slice)| {
                let points = slice
                    .iter()
                    .enumerate()
                    .map(|(band, &level)| Self::project(size, age, band, level))
                    .collect();
                (age, points)
            })
            .collect();

        // Far slices first so near ones paint over them.
        for (age, points) in rows.iter().rev() {
            let scale = 1.0 / (1.0 + *age as f32 * DEPTH_STEP);
            let color = Rgba::hsl(260.0 - *age as f32 * 4.0, 0.8, 0.55).with_alpha(scale);
            canvas.stroke_path(points, false, Stroke::new(color, 1.5 * scale + 0.5));
        }

        for pair in rows.windows(2).rev() {
            let (age, near) = &pair[0];
            let (_, far) = &pair[1];
            let scale = 1.0 / (1.0 + *age as f32 * DEPTH_STEP);
            for band in (0..near.len().min(far.len())).step_by(RIB_SPACING) {
                canvas.stroke_line(
                    far[band],
                    near[band],
                    Stroke::new(Rgba::hsl(200.0, 0.6, 0.5).with_alpha(scale * 0.5), 0.75),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::two_d::testing;
    use crate::render::{DisplayList, DrawCommand};

    #[test]
    fn history_stays_bounded() {
        let mut mode = Lattice::default();
        let mut canvas = DisplayList::new(320, 200);
        for frame in 0..10_000u32 {
            canvas.begin_frame();
            let level = (frame % 255) as u8;
            mode.draw(&mut canvas, &testing::snapshot(level, level, level));
        }
        assert_eq!(mode.history_len(), SLICES);
        assert_eq!(
            canvas.count(|command| matches!(command, DrawCommand::Path { .. })),
            SLICES
        );
    }

    #[test]
    fn older_slices_sit_closer_to_the_horizon() {
        let size = Vec2::new(320.0, 200.0);
        let near = Lattice::project(size, 0, 0, 0.0);
        let far = Lattice::project(size, 39, 0, 0.0);
        assert!(far.y < near.y);
        assert!(far.x > near.x, "far slices converge to the centre");
    }
}
