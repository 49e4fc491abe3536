//! The fixed set of visual modes and the registry that builds them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::render::Renderer;
use crate::{MusicVizError, Result};

pub mod three_d;
pub mod two_d;

/// Identifies one visual program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Spectrogram,
    Circular,
    Waveform,
    Kaleidoscope,
    Lattice,
    PulseTunnel,
    Starfall,
    TidalBloom,
    VoxelOctopus,
    WireframeMatrix,
    ParticleGalaxy,
    CrystalLattice,
    PlasmaWave,
    NebulaStorm,
    FractalCosmos,
    AetherRings,
    PrismShardField,
    FluxBloom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModeFamily {
    Canvas2d,
    Scene3d,
}

impl RenderMode {
    pub const ALL: [RenderMode; 18] = [
        RenderMode::Spectrogram,
        RenderMode::Circular,
        RenderMode::Waveform,
        RenderMode::Kaleidoscope,
        RenderMode::Lattice,
        RenderMode::PulseTunnel,
        RenderMode::Starfall,
        RenderMode::TidalBloom,
        RenderMode::VoxelOctopus,
        RenderMode::WireframeMatrix,
        RenderMode::ParticleGalaxy,
        RenderMode::CrystalLattice,
        RenderMode::PlasmaWave,
        RenderMode::NebulaStorm,
        RenderMode::FractalCosmos,
        RenderMode::AetherRings,
        RenderMode::PrismShardField,
        RenderMode::FluxBloom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RenderMode::Spectrogram => "spectrogram",
            RenderMode::Circular => "circular",
            RenderMode::Waveform => "waveform",
            RenderMode::Kaleidoscope => "kaleidoscope",
            RenderMode::Lattice => "lattice",
            RenderMode::PulseTunnel => "pulse_tunnel",
            RenderMode::Starfall => "starfall",
            RenderMode::TidalBloom => "tidal_bloom",
            RenderMode::VoxelOctopus => "voxel_octopus",
            RenderMode::WireframeMatrix => "wireframe_matrix",
            RenderMode::ParticleGalaxy => "particle_galaxy",
            RenderMode::CrystalLattice => "crystal_lattice",
            RenderMode::PlasmaWave => "plasma_wave",
            RenderMode::NebulaStorm => "nebula_storm",
            RenderMode::FractalCosmos => "fractal_cosmos",
            RenderMode::AetherRings => "aether_rings",
            RenderMode::PrismShardField => "prism_shard_field",
            RenderMode::FluxBloom => "flux_bloom",
        }
    }

    pub fn family(self) -> ModeFamily {
        match self {
            RenderMode::Spectrogram
            | RenderMode::Circular
            | RenderMode::Waveform
            | RenderMode::Kaleidoscope
            | RenderMode::Lattice
            | RenderMode::PulseTunnel
            | RenderMode::Starfall
            | RenderMode::TidalBloom
            | RenderMode::VoxelOctopus
            | RenderMode::WireframeMatrix => ModeFamily::Canvas2d,
            _ => ModeFamily::Scene3d,
        }
    }

    pub fn is_3d(self) -> bool {
        self.family() == ModeFamily::Scene3d
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RenderMode {
    type Err = MusicVizError;

    /// Accepts `snake_case`, `kebab-case` and any letter case.
    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        RenderMode::ALL
            .into_iter()
            .find(|mode| mode.name() == normalized)
            .ok_or_else(|| MusicVizError::UnknownMode(value.to_string()))
    }
}

pub type RendererFactory = fn() -> Box<dyn Renderer>;

/// Mode-keyed table of renderer constructors.
#[derive(Default)]
pub struct ModeRegistry {
    factories: HashMap<RenderMode, RendererFactory>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every built-in mode.
    pub fn with_builtin_modes() -> Self {
        let mut registry = Self::new();
        two_d::register(&mut registry);
        three_d::register(&mut registry);
        registry
    }

    pub fn register(&mut self, mode: RenderMode, factory: RendererFactory) {
        self.factories.insert(mode, factory);
    }

    pub fn contains(&self, mode: RenderMode) -> bool {
        self.factories.contains_key(&mode)
    }

    /// Builds a fresh renderer with pristine state.
    pub fn create(&self, mode: RenderMode) -> Result<Box<dyn Renderer>> {
        self.factories
            .get(&mode)
            .map(|factory| factory())
            .ok_or_else(|| MusicVizError::UnknownMode(mode.to_string()))
    }

    pub fn modes(&self) -> Vec<RenderMode> {
        let mut modes: Vec<RenderMode> = self.factories.keys().copied().collect();
        modes.sort();
        modes
    }
}

impl fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeRegistry")
            .field("modes", &self.modes())
            .finish()
    }
}
