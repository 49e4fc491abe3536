use glam::Vec2;

use super::CanvasMode;
use crate::modes::RenderMode;
use crate::render::{Canvas, ClearPolicy, Rgba};
use crate::AudioSnapshot;

const BAR_COUNT: usize = 128;
/// Share of the spectrum spread across the bars; the top quarter is
/// mostly empty for music.
const SPECTRUM_SHARE: f32 = 0.75;
const PEAK_FALL: f32 = 2.0;
const PEAK_HEIGHT: f32 = 2.0;

/// Bar spectrum with phosphor trails and falling peak caps.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    peaks: Vec<f32>,
}

impl Default for Spectrogram {
    fn default() -> Self {
        Self {
            peaks: vec![0.0; BAR_COUNT],
        }
    }
}

impl Spectrogram {
    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }
}

impl CanvasMode for Spectrogram {
    const MODE: RenderMode = RenderMode::Spectrogram;

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::Fade { alpha: 0.2 }
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot) {
        let size = canvas.size();
        let levels = snapshot.band_slice(BAR_COUNT, SPECTRUM_SHARE);
        let slot = size.x / BAR_COUNT as f32;
        let bar_width = (slot - 2.0).max(1.0);

        for (i, level) in levels.iter().enumerate() {
            let height = level * size.y * 0.9;
            let x = i as f32 * slot + 1.0;
            let hue = i as f32 / BAR_COUNT as f32 * 360.0;

            if height > 0.0 {
                canvas.fill_rect(
                    Vec2::new(x, size.y - height),
                    Vec2::new(bar_width, height),
                    Rgba::hsl(hue, 0.8, 0.5 + level * 0.2),
                );
            }

            let peak = &mut self.peaks[i];
            *peak = (*peak - PEAK_FALL).max(height);
            if *peak > 0.0 {
                canvas.fill_rect(
                    Vec2::new(x, size.y - *peak - PEAK_HEIGHT - 1.0),
                    Vec2::new(bar_width, PEAK_HEIGHT),
                    Rgba::WHITE.with_alpha(0.8),
                );
            }
        }
    }
}
