//! Scene-graph modes.
//!
//! A [`SceneMode`] describes what to allocate and how to animate it;
//! [`SceneRenderer`] owns the [`SceneGraph`], the frame clock and the beat
//! detector, and guarantees the scene is disposed on deactivation or when
//! building it fails halfway.

use glam::{Vec2, Vec3};

use crate::modes::{ModeRegistry, RenderMode};
use crate::reactive::BeatDetector;
use crate::render::{GpuDevice, Renderer, Rgba, Surfaces, TextureId, Viewport};
use crate::scene::{Light, SceneGraph};
use crate::timeline::FrameClock;
use crate::{AudioSnapshot, NormalizedBands, Result, SCENE_CLOCK_DELTA};

pub mod aether_rings;
pub mod crystal_lattice;
pub mod flux_bloom;
pub mod fractal_cosmos;
pub mod nebula_storm;
pub mod particle_galaxy;
pub mod plasma_wave;
pub mod prism_shard_field;
pub mod shaders;

pub use aether_rings::AetherRings;
pub use crystal_lattice::CrystalLattice;
pub use flux_bloom::FluxBloom;
pub use fractal_cosmos::FractalCosmos;
pub use nebula_storm::NebulaStorm;
pub use particle_galaxy::ParticleGalaxy;
pub use plasma_wave::PlasmaWave;
pub use prism_shard_field::PrismShardField;

/// Inputs to one animation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneFrame {
    /// Scene clock, advanced by a fixed step per update.
    pub time: f32,
    pub audio: NormalizedBands,
    pub beat: bool,
}

pub trait SceneMode {
    const MODE: RenderMode;

    /// Allocates programs, geometry and textures through `scene`. Static
    /// per-instance attributes are generated here and never again.
    fn build(&mut self, scene: &mut SceneGraph, gpu: &mut dyn GpuDevice) -> Result<()>;

    /// Updates camera, lights and dynamic per-instance data for one frame.
    fn animate(
        &mut self,
        scene: &mut SceneGraph,
        gpu: &mut dyn GpuDevice,
        frame: &SceneFrame,
    ) -> Result<()>;

    /// Value uploaded in the mode-specific uniform slot.
    fn mode_param(&self) -> f32 {
        0.0
    }

    /// Called after the scene applied the new viewport.
    fn resize(
        &mut self,
        _scene: &mut SceneGraph,
        _gpu: &mut dyn GpuDevice,
        _viewport: Viewport,
    ) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle wrapper shared by every 3D mode.
#[derive(Debug)]
pub struct SceneRenderer<M> {
    state: M,
    scene: Option<SceneGraph>,
    clock: FrameClock,
    beat: BeatDetector,
}

impl<M: SceneMode + Default> SceneRenderer<M> {
    pub fn new() -> Self {
        Self {
            state: M::default(),
            scene: None,
            clock: FrameClock::new(SCENE_CLOCK_DELTA),
            beat: BeatDetector::new(),
        }
    }
}

impl<M: SceneMode + Default> Default for SceneRenderer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> SceneRenderer<M> {
    pub fn state(&self) -> &M {
        &self.state
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.scene.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.scene.is_some()
    }

    pub fn time(&self) -> f32 {
        self.clock.time()
    }
}

impl<M: SceneMode> Renderer for SceneRenderer<M> {
    fn mode(&self) -> RenderMode {
        M::MODE
    }

    fn activate(&mut self, surfaces: &mut Surfaces<'_>, viewport: Viewport) -> Result<()> {
        let gpu = &mut *surfaces.gpu;
        if let Some(stale) = self.scene.take() {
            stale.dispose(gpu);
        }

        let mut scene = SceneGraph::new(gpu, viewport)?;
        let built = scene
            .resize(gpu, viewport)
            .and_then(|()| self.state.build(&mut scene, gpu));
        if let Err(err) = built {
            scene.dispose(gpu);
            return Err(err);
        }

        let mode = M::MODE;
        tracing::debug!(
            mode = %mode,
            resources = scene.resource_count(),
            "scene built"
        );
        self.clock.reset();
        self.scene = Some(scene);
        Ok(())
    }

    fn update(&mut self, surfaces: &mut Surfaces<'_>, snapshot: &AudioSnapshot) -> Result<()> {
        let Some(scene) = self.scene.as_mut() else {
            return Ok(());
        };
        let gpu = &mut *surfaces.gpu;
        let frame = SceneFrame {
            time: self.clock.advance(),
            audio: snapshot.normalized(),
            beat: self.beat.detect(snapshot.bass_energy),
        };
        self.state.animate(scene, gpu, &frame)?;
        scene.render(gpu, frame.audio, frame.time, self.state.mode_param())
    }

    fn resize(&mut self, surfaces: &mut Surfaces<'_>, viewport: Viewport) -> Result<()> {
        let Some(scene) = self.scene.as_mut() else {
            return Ok(());
        };
        let gpu = &mut *surfaces.gpu;
        scene.resize(gpu, viewport)?;
        self.state.resize(scene, gpu, viewport)
    }

    fn deactivate(&mut self, surfaces: &mut Surfaces<'_>) {
        if let Some(scene) = self.scene.take() {
            scene.dispose(&mut *surfaces.gpu);
        }
    }
}

impl<M> Drop for SceneRenderer<M> {
    fn drop(&mut self) {
        if let Some(scene) = &self.scene {
            tracing::warn!(
                resources = scene.resource_count(),
                "scene renderer dropped without deactivate, gpu resources leaked"
            );
        }
    }
}

/// Ambient fill plus one point light, the rig most scenes start from.
pub(crate) fn default_lights(scene: &mut SceneGraph, key_position: Vec3, key_color: Rgba) {
    scene.lights.clear();
    scene.lights.push(Light::Ambient {
        color: Rgba::rgb(0.6, 0.65, 0.8),
        intensity: 0.35,
    });
    scene.lights.push(Light::Point {
        position: key_position,
        color: key_color,
        intensity: 1.2,
    });
}

/// Camera circling the origin; `time` is the scene clock.
pub(crate) fn orbit(scene: &mut SceneGraph, time: f32, speed: f32, radius: f32, height: f32) {
    let angle = time * speed;
    scene.camera.look_at(
        Vec3::new(angle.cos() * radius, height, angle.sin() * radius),
        Vec3::ZERO,
    );
}

/// White sprite with a quadratic radial alpha falloff, for point clouds.
pub(crate) fn glow_sprite(
    scene: &mut SceneGraph,
    gpu: &mut dyn GpuDevice,
    label: &str,
    size: u32,
) -> Result<TextureId> {
    let size = size.max(2);
    let texture = scene.create_texture(gpu, label, size, size)?;
    let half = size as f32 * 0.5;
    let mut texels = Vec::with_capacity(size as usize * size as usize * 4);
    for y in 0..size {
        for x in 0..size {
            let offset = Vec2::new(x as f32 + 0.5 - half, y as f32 + 0.5 - half);
            let alpha = (1.0 - offset.length() / half).max(0.0).powi(2);
            texels.extend_from_slice(&[255, 255, 255, (alpha * 255.0).round() as u8]);
        }
    }
    gpu.write_texture(texture, &texels)?;
    Ok(texture)
}

fn create<M: SceneMode + Default + 'static>() -> Box<dyn Renderer> {
    Box::new(SceneRenderer::<M>::new())
}

pub(crate) fn register(registry: &mut ModeRegistry) {
    registry.register(RenderMode::ParticleGalaxy, create::<ParticleGalaxy>);
    registry.register(RenderMode::CrystalLattice, create::<CrystalLattice>);
    registry.register(RenderMode::PlasmaWave, create::<PlasmaWave>);
    registry.register(RenderMode::NebulaStorm, create::<NebulaStorm>);
    registry.register(RenderMode::FractalCosmos, create::<FractalCosmos>);
    registry.register(RenderMode::AetherRings, create::<AetherRings>);
    registry.register(RenderMode::PrismShardField, create::<PrismShardField>);
    registry.register(RenderMode::FluxBloom, create::<FluxBloom>);
}
