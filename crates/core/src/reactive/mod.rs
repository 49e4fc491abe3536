//! Small stateful building blocks shared by the render modes: band
//! smoothing, the bass beat detector, rotation accumulators, bounded slice
//! history and life-decaying particle pools.

use std::collections::VecDeque;

use glam::Vec2;

use crate::render::Rgba;
use crate::AudioSnapshot;

pub const BEAT_RATIO: f32 = 1.4;
pub const BEAT_FLOOR: f32 = 120.0;

/// Exponentially smoothed copy of the three band energies (0..255 scale).
#[derive(Debug, Clone, Copy)]
pub struct BandSmoother {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    factors: [f32; 3],
}

impl BandSmoother {
    pub fn new(bass_factor: f32, mid_factor: f32, treble_factor: f32) -> Self {
        Self {
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            factors: [bass_factor, mid_factor, treble_factor],
        }
    }

    pub fn update(&mut self, snapshot: &AudioSnapshot) {
        self.bass += (snapshot.bass_energy - self.bass) * self.factors[0];
        self.mid += (snapshot.mid_energy - self.mid) * self.factors[1];
        self.treble += (snapshot.treble_energy - self.treble) * self.factors[2];
    }
}

impl Default for BandSmoother {
    fn default() -> Self {
        Self::new(0.15, 0.18, 0.2)
    }
}

/// Flags a beat when bass jumps 40% above the previous frame and is loud.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeatDetector {
    previous_bass: f32,
}

impl BeatDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the raw bass energy of this frame. The previous value is
    /// replaced whether or not a beat was detected.
    pub fn detect(&mut self, raw_bass: f32) -> bool {
        let is_beat = raw_bass > self.previous_bass * BEAT_RATIO && raw_bass > BEAT_FLOOR;
        self.previous_bass = raw_bass;
        is_beat
    }

    pub fn previous_bass(&self) -> f32 {
        self.previous_bass
    }
}

/// Unbounded angle that grows by a base step plus an audio term per frame.
/// Consumers pass it straight to `sin`/`cos`; it is never wrapped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator {
    value: f32,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, base: f32, audio_term: f32) -> f32 {
        self.value += base + audio_term;
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// Fixed-capacity history; pushing onto a full buffer evicts the oldest.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    slices: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, slice: T) {
        if self.slices.len() == self.capacity {
            self.slices.pop_front();
        }
        self.slices.push_back(slice);
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Newest first, paired with its age in frames (0 = this frame).
    pub fn iter_by_age(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slices.iter().rev().enumerate()
    }

    pub fn clear(&mut self) {
        self.slices.clear();
    }
}

/// A single 2D particle. `life` runs from 1 down to 0.
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub life: f32,
    pub size: f32,
    pub color: Rgba,
}

impl Particle {
    pub fn new(position: Vec2, velocity: Vec2, size: f32, color: Rgba) -> Self {
        Self {
            position,
            velocity,
            angle: 0.0,
            life: 1.0,
            size,
            color,
        }
    }
}

/// Particle pool with a fixed per-frame life decay and an optional cap.
#[derive(Debug, Clone)]
pub struct ParticlePool {
    particles: Vec<Particle>,
    capacity: Option<usize>,
    decay: f32,
}

impl ParticlePool {
    pub fn new(decay: f32, capacity: Option<usize>) -> Self {
        Self {
            particles: Vec::new(),
            capacity,
            decay: decay.max(f32::EPSILON),
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity
            .map(|cap| self.particles.len() >= cap)
            .unwrap_or(false)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Adds a particle unless the pool is at capacity.
    pub fn spawn(&mut self, particle: Particle) -> bool {
        if self.is_full() {
            return false;
        }
        self.particles.push(particle);
        true
    }

    /// Spawns up to `max_per_frame` particles while `level > threshold`.
    pub fn spawn_gated(
        &mut self,
        level: f32,
        threshold: f32,
        max_per_frame: usize,
        mut make: impl FnMut(usize) -> Particle,
    ) -> usize {
        if level <= threshold {
            return 0;
        }
        let mut spawned = 0;
        while spawned < max_per_frame && self.spawn(make(spawned)) {
            spawned += 1;
        }
        spawned
    }

    /// Decays life, integrates position, applies `step` and drops every
    /// particle whose life is no longer positive, all in the same frame.
    pub fn advance(&mut self, mut step: impl FnMut(&mut Particle)) {
        let decay = self.decay;
        self.particles.retain_mut(|particle| {
            particle.life -= decay;
            particle.position += particle.velocity;
            step(particle);
            particle.life > 0.0
        });
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
