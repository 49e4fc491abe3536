use serde::{Deserialize, Serialize};

/// Last bin (exclusive) of the bass band.
pub const BASS_END: usize = 10;
/// Last bin (exclusive) of the mid band. Everything above is treble.
///
/// Both cutoffs are bin indices tuned for a 2048-point window at 44.1 kHz and
/// are not recomputed for other sample rates.
pub const MID_END: usize = 100;

/// One frame's complete audio analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSnapshot {
    pub frequency_bins: Vec<u8>,
    pub time_domain_samples: Vec<u8>,
    pub rms: f32,
    pub bass_energy: f32,
    pub mid_energy: f32,
    pub treble_energy: f32,
}

/// Band energies divided by 255.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NormalizedBands {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub rms: f32,
}

impl AudioSnapshot {
    /// Snapshot handed out before any source is attached.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Derives rms and band energies from raw analyser buffers.
    pub fn from_buffers(frequency_bins: Vec<u8>, time_domain_samples: Vec<u8>) -> Self {
        let rms = compute_rms(&frequency_bins);
        let len = frequency_bins.len();
        let bass_energy = mean(&frequency_bins[..BASS_END.min(len)]);
        let mid_energy = mean(&frequency_bins[BASS_END.min(len)..MID_END.min(len)]);
        let treble_energy = mean(&frequency_bins[MID_END.min(len)..]);

        Self {
            frequency_bins,
            time_domain_samples,
            rms,
            bass_energy,
            mid_energy,
            treble_energy,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frequency_bins.is_empty()
    }

    pub fn normalized(&self) -> NormalizedBands {
        NormalizedBands {
            bass: self.bass_energy / 255.0,
            mid: self.mid_energy / 255.0,
            treble: self.treble_energy / 255.0,
            rms: self.rms / 255.0,
        }
    }

    /// Bin value at `index` scaled to `[0, 1]`, zero when out of range.
    pub fn bin(&self, index: usize) -> f32 {
        self.frequency_bins
            .get(index)
            .map(|value| *value as f32 / 255.0)
            .unwrap_or(0.0)
    }

    /// Averages the lower `fraction` of the spectrum into `bands` buckets.
    pub fn band_slice(&self, bands: usize, fraction: f32) -> Vec<f32> {
        if bands == 0 {
            return Vec::new();
        }
        let usable = ((self.frequency_bins.len() as f32 * fraction) as usize)
            .min(self.frequency_bins.len());
        if usable == 0 {
            return vec![0.0; bands];
        }

        (0..bands)
            .map(|band| {
                let start = band * usable / bands;
                let end = ((band + 1) * usable / bands).max(start + 1).min(usable);
                mean(&self.frequency_bins[start..end]) / 255.0
            })
            .collect()
    }
}

fn mean(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&bin| bin as u32).sum();
    sum as f32 / bins.len() as f32
}

fn compute_rms(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: f64 = bins.iter().map(|&bin| (bin as f64) * (bin as f64)).sum();
    (sum / bins.len() as f64).sqrt() as f32
}
