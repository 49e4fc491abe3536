use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{RenderMode, Result};

/// Transform window of the analysis node. Gives `FFT_SIZE / 2` frequency bins
/// of roughly 21.5 Hz each at 44.1 kHz.
pub const FFT_SIZE: usize = 2048;
/// Number of frequency bins (and time-domain samples) in every snapshot.
pub const BIN_COUNT: usize = FFT_SIZE / 2;
/// Temporal smoothing applied to raw magnitudes between reads.
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
/// Magnitude mapped to byte 0; quieter bins clamp here.
pub const MIN_DECIBELS: f32 = -100.0;
/// Magnitude mapped to byte 255; louder bins clamp here.
pub const MAX_DECIBELS: f32 = -30.0;
/// Internal clock step of the 3D modes, independent of wall time.
pub const SCENE_CLOCK_DELTA: f32 = 0.01;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing sections fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Initial gain of the audible output path in `[0, 1]`.
    pub output_level: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            output_level: 1.0,
        }
    }
}

/// Drawing surface defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub initial_mode: RenderMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            pixel_ratio: 1.0,
            initial_mode: RenderMode::Spectrogram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "render": { "width": 640, "height": 480, "pixel_ratio": 2.0, "initial_mode": "kaleidoscope" } }"#)
                .unwrap();

        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.render.width, 640);
        assert_eq!(config.render.initial_mode, RenderMode::Kaleidoscope);
    }

    #[test]
    fn bin_count_is_half_the_window() {
        assert_eq!(BIN_COUNT * 2, FFT_SIZE);
    }
}
