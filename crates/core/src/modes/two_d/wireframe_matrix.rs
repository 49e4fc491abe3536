use glam::{Mat3, Vec2, Vec3};

use super::CanvasMode;
use crate::modes::RenderMode;
use crate::reactive::{Accumulator, BandSmoother};
use crate::render::{Canvas, ClearPolicy, Rgba, Stroke};
use crate::AudioSnapshot;

const GRID: usize = 5;
const SPACING: f32 = 2.4;
const CAMERA_DISTANCE: f32 = 12.0;
const NEAR: f32 = 0.1;

const CORNERS: [Vec3; 8] = [
    Vec3::new(-1.0, -1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(1.0, -1.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(-1.0, 1.0, 1.0),
];

const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// A 5x5 grid of spinning wireframe cubes, one spectrum band per cube,
/// projected with a simple perspective divide.
#[derive(Debug, Clone, Default)]
pub struct WireframeMatrix {
    smoother: BandSmoother,
    yaw: Accumulator,
    pitch: Accumulator,
}

impl WireframeMatrix {
    pub fn angles(&self) -> (f32, f32) {
        (self.yaw.value(), self.pitch.value())
    }
}

fn project(point: Vec3, center: Vec2, focal: f32) -> Option<Vec2> {
    let z = point.z + CAMERA_DISTANCE;
    if z <= NEAR {
        return None;
    }
    let scale = focal / z;
    Some(center + Vec2::new(point.x, -point.y) * scale)
}

impl CanvasMode for WireframeMatrix {
    const MODE: RenderMode = RenderMode::WireframeMatrix;

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::Full
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, snapshot: &AudioSnapshot) {
        self.smoother.update(snapshot);
        let yaw = self.yaw.advance(0.01, snapshot.mid_energy / 255.0 * 0.02);
        let pitch = self
            .pitch
            .advance(0.007, snapshot.treble_energy / 255.0 * 0.01);

        let size = canvas.size();
        let center = size * 0.5;
        let focal = size.min_element() * 0.9;
        let spin = Mat3::from_rotation_y(yaw) * Mat3::from_rotation_x(pitch);
        let tilt = Mat3::from_rotation_y(yaw * 0.3);
        let bands = snapshot.band_slice(GRID * GRID, 0.6);
        let offset = (GRID - 1) as f32 * 0.5;

        for gy in 0..GRID {
            for gx in 0..GRID {
                let index = gy * GRID + gx;
                let level = bands.get(index).copied().unwrap_or(0.0);
                let half = 0.4 + level * 0.8 + self.smoother.bass / 255.0 * 0.2;
                let cell = tilt
                    * Vec3::new(
                        (gx as f32 - offset) * SPACING,
                        (gy as f32 - offset) * SPACING,
                        0.0,
                    );

                let projected: Vec<Option<Vec2>> = CORNERS
                    .iter()
                    .map(|&corner| project(cell + spin * (corner * half), center, focal))
                    .collect();
                let stroke = Stroke::new(
                    Rgba::hsl(index as f32 * 14.0 + yaw.to_degrees(), 0.8, 0.5 + level * 0.3),
                    1.0 + level * 1.5,
                );
                for &(a, b) in &EDGES {
                    if let (Some(from), Some(to)) = (projected[a], projected[b]) {
                        canvas.stroke_line(from, to, stroke);
                    }
                }
            }
        }
    }
}
