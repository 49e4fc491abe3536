//! Software analysis node.
//!
//! Reproduces the byte-scaled output of a browser analyser: a Blackman
//! windowed real FFT over the most recent [`FFT_SIZE`] samples, temporally
//! smoothed magnitudes converted to decibels and mapped onto `0..=255`.

use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::config::{FFT_SIZE, MAX_DECIBELS, MIN_DECIBELS, SMOOTHING_TIME_CONSTANT};
use crate::Result;

pub mod snapshot;

pub use snapshot::{AudioSnapshot, NormalizedBands, BASS_END, MID_END};

/// Analysis node fed with mono samples and read once per frame.
pub struct Analyser {
    fft_size: usize,
    smoothing: f32,
    /// Ring of the most recent `fft_size` samples, oldest at `write_pos`.
    window: Vec<f32>,
    write_pos: usize,
    blackman: Vec<f32>,
    smoothed: Vec<f32>,
    fft: FftResources,
}

impl Analyser {
    /// Creates an analyser with the build-time window and smoothing constants.
    pub fn new() -> Self {
        Self::with_params(FFT_SIZE, SMOOTHING_TIME_CONSTANT)
    }

    pub fn with_params(fft_size: usize, smoothing: f32) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);
        let fft = FftResources {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            window: vec![0.0; fft_size],
            write_pos: 0,
            blackman: (0..fft_size).map(|i| blackman_value(i, fft_size)).collect(),
            smoothed: vec![0.0; fft_size / 2],
            fft,
        }
    }

    /// Number of frequency bins produced per read.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Zeroes the sample window and the smoothing memory.
    pub fn reset(&mut self) {
        self.window.iter_mut().for_each(|sample| *sample = 0.0);
        self.smoothed.iter_mut().for_each(|value| *value = 0.0);
        self.write_pos = 0;
    }

    /// Appends samples to the analysis window, discarding the oldest.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let skip = samples.len().saturating_sub(self.fft_size);
        for &sample in &samples[skip..] {
            self.window[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Writes `bin_count` byte magnitudes into `out`.
    pub fn frequency_data(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let len = self.fft_size;
        for i in 0..len {
            let sample = self.window[(self.write_pos + i) % len];
            self.fft.input[i] = sample * self.blackman[i];
        }

        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let bins = self.bin_count();
        let tau = self.smoothing;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        out.clear();
        out.reserve(bins);

        for k in 0..bins {
            let magnitude = self.fft.spectrum[k].norm() / len as f32;
            let smoothed = tau * self.smoothed[k] + (1.0 - tau) * magnitude;
            // Non-finite input would otherwise poison every following read.
            self.smoothed[k] = if smoothed.is_finite() { smoothed } else { 0.0 };

            let decibels = if self.smoothed[k] > 0.0 {
                20.0 * self.smoothed[k].log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 / range * (decibels - MIN_DECIBELS);
            out.push(scaled.clamp(0.0, 255.0) as u8);
        }

        Ok(())
    }

    /// Writes the first `bin_count` samples of the window as bytes centred
    /// on 128. These are the oldest half of the most recent `fft_size`
    /// frame, which is what a browser analyser hands a half-length array;
    /// the newest samples are intentionally not the ones returned.
    pub fn time_domain_data(&self, out: &mut Vec<u8>) {
        let len = self.fft_size;
        out.clear();
        out.extend((0..self.bin_count()).map(|i| {
            let sample = self.window[(self.write_pos + i) % len];
            (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8
        }));
    }

    /// Reads both buffers once and derives the band energies.
    pub fn snapshot(&mut self) -> Result<AudioSnapshot> {
        let mut bins = Vec::with_capacity(self.bin_count());
        let mut samples = Vec::with_capacity(self.bin_count());
        self.frequency_data(&mut bins)?;
        self.time_domain_data(&mut samples);
        Ok(AudioSnapshot::from_buffers(bins, samples))
    }
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new()
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("write_pos", &self.write_pos)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let phase = 2.0 * PI * index as f32 / len as f32;
    a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq_hz: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq_hz * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn silence_reads_as_zero_bytes() {
        let mut analyser = Analyser::new();
        analyser.push_samples(&vec![0.0; FFT_SIZE]);
        let snapshot = analyser.snapshot().unwrap();

        assert_eq!(snapshot.frequency_bins.len(), FFT_SIZE / 2);
        assert!(snapshot.frequency_bins.iter().all(|&bin| bin == 0));
        assert!(snapshot.time_domain_samples.iter().all(|&s| s == 128));
        assert_eq!(snapshot.rms, 0.0);
    }

    #[test]
    fn low_tone_lands_in_bass_band() {
        let mut analyser = Analyser::with_params(FFT_SIZE, 0.0);
        // Bin 4 at 44.1 kHz.
        analyser.push_samples(&sine(86.13, 44_100.0, FFT_SIZE));
        let snapshot = analyser.snapshot().unwrap();

        let loudest = snapshot
            .frequency_bins
            .iter()
            .enumerate()
            .max_by_key(|(_, value)| **value)
            .map(|(index, _)| index)
            .unwrap();
        assert!(loudest < BASS_END, "peak at bin {loudest}");
        assert!(snapshot.bass_energy > snapshot.treble_energy);
    }

    #[test]
    fn smoothing_decays_towards_silence() {
        let mut analyser = Analyser::new();
        analyser.push_samples(&sine(1_000.0, 44_100.0, FFT_SIZE));
        let loud = analyser.snapshot().unwrap();

        analyser.push_samples(&vec![0.0; FFT_SIZE]);
        let fading = analyser.snapshot().unwrap();

        assert!(fading.rms > 0.0, "smoothing keeps some energy");
        assert!(fading.rms <= loud.rms);
    }

    #[test]
    fn oversized_blocks_keep_the_newest_samples() {
        let mut analyser = Analyser::with_params(8, 0.0);
        let block: Vec<f32> = (0..12).map(|i| if i < 4 { 1.0 } else { 0.0 }).collect();
        analyser.push_samples(&block);

        let mut samples = Vec::new();
        analyser.time_domain_data(&mut samples);
        assert_eq!(samples, vec![128; 4]);
    }

    #[test]
    fn time_domain_reads_the_older_half_of_the_window() {
        let mut analyser = Analyser::with_params(8, 0.0);
        analyser.push_samples(&[0.5, 0.5, 0.5, 0.5, -0.5, -0.5, -0.5, -0.5]);

        let mut samples = Vec::new();
        analyser.time_domain_data(&mut samples);
        assert_eq!(samples, vec![192; 4]);
    }

    #[test]
    fn reset_clears_window() {
        let mut analyser = Analyser::with_params(16, 0.5);
        analyser.push_samples(&[1.0; 16]);
        analyser.reset();

        let snapshot = analyser.snapshot().unwrap();
        assert!(snapshot.frequency_bins.iter().all(|&bin| bin == 0));
    }
}
