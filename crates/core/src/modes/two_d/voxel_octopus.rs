use std::f32::consts::TAU;

use glam::{Vec2, Vec3};

use super::CanvasMode;
use crate::modes::RenderMode;
use crate::reactive::{Accumulator, BandSmoother, BeatDetector};
use crate::render::{Canvas, ClearPolicy, Rgba};
use crate::AudioSnapshot;

const TENTACLES: usize = 8;
const SEGMENTS: usize = 10;
const EYE_FADE: f32 = 0.85;

#[derive(Debug, Clone, Copy)]
struct Voxel {
    position: Vec3,
    color: Rgba,
}

/// Isometric voxel creature. The head swells with bass, tentacles wave on a
/// mid-driven phase and the eyes flash on beats.
#[derive(Debug, Clone, Default)]
pub struct VoxelOctopus {
    smoother: BandSmoother,
    beat: BeatDetector,
    phase: Accumulator,
    bob: Accumulator,
    eye_flash: f32,
}

impl VoxelOctopus {
    pub fn eye_flash(&self) -> f32 {
        self.eye_flash
    }

    fn build(&self) -> Vec<Voxel> {
        let mut voxels = Vec::new();

        let head_radius = 3.0 + self.smoother.bass / 255.0 * 1.5;
        let reach = head_radius.ceil() as i32;
        for x in -reach..=reach {
            for y in -reach..=reach {
                for z in -reach..=reach {
                    let position = Vec3::new(x as f32, y as f32, z as f32);
                    let distance = position.length();
                    if distance <= head_radius && distance > head_radius - 1.0 {
                        voxels.push(Voxel {
                            position,
                            color: Rgba::hsl(300.0 + y as f32 * 4.0, 0.6, 0.45),
                        });
                    }
                }
            }
        }

        let phase = self.phase.value();
        for t in 0..TENTACLES {
            let angle = t as f32 / TENTACLES as f32 * TAU;
            for s in 0..SEGMENTS {
                let radius = 2.5 + s as f32 * 0.9;
                let wave = (phase + s as f32 * 0.6 + t as f32).sin() * s as f32 * 0.15;
                voxels.push(Voxel {
                    position: Vec3::new(
                        angle.cos() * radius,
                        -2.0 - s as f32 * 0.8 + wave,
                        angle.sin() * radius,
                    ),
                    color: Rgba::hsl(300.0 + t as f32 * 8.0 + s as f32 * 3.0, 0.7, 0.45),
                });
            }
        }

        let eye = lerp_color(Rgba::hsl(50.0, 0.9, 0.5), Rgba::WHITE, self.eye_flash);
        for side in [-1.5, 1.5] {
            voxels.push(Voxel {
                position: Vec3::new(head_radius, 0.5, side),
                color: eye,
            });
        }

        // Painter's order for the isometric view: back and low first.
        voxels.sort_by(|a, b| depth_key(a.position).total_cmp(&depth_key(b.position)));
        voxels
    }
}

fn depth_key(position: Vec3) -> f32 {
    position.x + position.z + position.y
}

fn lerp_color(from: Rgba, to: Rgba, t: f32) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    Rgba::rgba(
        from.r + (to.r - from.r) * t,
        from.g + (to.g - from.g) * t,
        from.b + (to.b - from.b) * t,
        from.a + (to.a - from.a) * t,
    )
}

fn shade(color: Rgba, factor: f32) -> Rgba {
    Rgba::rgba(color.r * factor, color.g * factor, color.b * factor, color.a)
}

fn draw_cube(canvas: &mut dyn Canvas, origin: Vec2, unit: f32, position: Vec3, color: Rgba) {
    let project = |p: Vec3| {
        origin + Vec2::new((p.x - p.z) * unit * 0.866, (p.x + p.z) * unit * 0.5 - p.y * unit)
    };
    let corner = |dx: f32, dy: f32, dz: f32| project(position + Vec3::new(dx, dy, dz) * 0.5);

    let top = [
        corner(-1.0, 1.0, -1.0),
        corner(1.0, 1.0, -1.0),
        corner(1.0, 1.0, 1.0),
        corner(-1.0, 1.0, 1.0),
    ];
    let left = [
        corner(-1.0, 1.0, 1.0),
        corner(1.0, 1.0, 1.0),
        corner(1.0, -1.0, 1.0),
        corner(-1.0, -1.0, 1.0),
    ];
    let right = [
        corner(1.0, 1.0, -1.0),
        corner(1.0, 1.0, 1.0),
        corner(1.0, -1.0, 1.0),
        corner(1.0, -1.0, -1.0),
    ];
    canvas.fill_path(&top, color);
    canvas.fill_path(&left, shade(color, 0.75));
    canvas.fill_path(&right, shade(color, 0.55));
}

impl CanvasMode for VoxelOctopus {
    const MODE: RenderMode = RenderMode::VoxelOctopus;

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::Full
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot) {
        self.smoother.update(snapshot);
        if self.beat.detect(snapshot.bass_energy) {
            self.eye_flash = 1.0;
        } else {
            self.eye_flash *= EYE_FADE;
        }
        self.phase.advance(0.05, snapshot.mid_energy / 255.0 * 0.1);
        let bob = self.bob.advance(0.01, 0.0);

        let size = canvas.size();
        let unit = size.min_element() * 0.035;
        let origin = Vec2::new(size.x * 0.5, size.y * 0.4 + bob.sin() * size.y * 0.03);

        for voxel in self.build() {
            draw_cube(canvas, origin, unit, voxel.position, voxel.color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::two_d::testing;
    use crate::render::DisplayList;

    #[test]
    fn every_voxel_draws_three_faces() {
        let mut mode = VoxelOctopus::default();
        let mut canvas = DisplayList::new(300, 300);
        mode.draw(&mut canvas, &testing::silence());
        let voxels = mode.build().len();
        assert!(voxels >= TENTACLES * SEGMENTS + 2);
        assert_eq!(canvas.commands().len(), voxels * 3);
    }

    #[test]
    fn eyes_flash_on_beat() {
        let mut mode = VoxelOctopus::default();
        let mut canvas = DisplayList::new(300, 300);
        mode.draw(&mut canvas, &testing::snapshot(40, 0, 0));
        assert_eq!(mode.eye_flash(), 0.0);
        mode.draw(&mut canvas, &testing::snapshot(200, 0, 0));
        assert_eq!(mode.eye_flash(), 1.0);
        mode.draw(&mut canvas, &testing::snapshot(200, 0, 0));
        assert!(mode.eye_flash() < 1.0);
    }
}
