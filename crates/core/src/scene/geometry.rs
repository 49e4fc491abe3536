//! Flat-shaded primitives used by the 3D modes.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

fn push_triangle(out: &mut Vec<Vertex>, a: Vec3, b: Vec3, c: Vec3) {
    let normal = (b - a).cross(c - a).normalize_or_zero();
    for position in [a, b, c] {
        out.push(Vertex {
            position: position.to_array(),
            normal: normal.to_array(),
        });
    }
}

/// Unit octahedron, 8 faces.
pub fn octahedron(radius: f32) -> Vec<Vertex> {
    let px = Vec3::X * radius;
    let nx = -px;
    let py = Vec3::Y * radius;
    let ny = -py;
    let pz = Vec3::Z * radius;
    let nz = -pz;

    let faces = [
        (px, py, pz),
        (pz, py, nx),
        (nx, py, nz),
        (nz, py, px),
        (px, pz, ny),
        (pz, nx, ny),
        (nx, nz, ny),
        (nz, px, ny),
    ];
    let mut vertices = Vec::with_capacity(faces.len() * 3);
    for (a, b, c) in faces {
        push_triangle(&mut vertices, a, b, c);
    }
    vertices
}

/// Elongated tetrahedron used for crystal shards.
pub fn shard(length: f32, width: f32) -> Vec<Vertex> {
    let tip = Vec3::new(0.0, length * 0.5, 0.0);
    let tail = Vec3::new(0.0, -length * 0.5, 0.0);
    let ring: Vec<Vec3> = (0..3)
        .map(|i| {
            let angle = i as f32 / 3.0 * TAU;
            Vec3::new(angle.cos() * width, 0.0, angle.sin() * width)
        })
        .collect();

    let mut vertices = Vec::with_capacity(18);
    for i in 0..3 {
        let a = ring[i];
        let b = ring[(i + 1) % 3];
        push_triangle(&mut vertices, a, tip, b);
        push_triangle(&mut vertices, b, tail, a);
    }
    vertices
}

/// Torus around the Y axis.
pub fn torus(major: f32, minor: f32, radial: usize, tubular: usize) -> Vec<Vertex> {
    let radial = radial.max(3);
    let tubular = tubular.max(3);
    let point = |i: usize, j: usize| {
        let u = i as f32 / tubular as f32 * TAU;
        let v = j as f32 / radial as f32 * TAU;
        let ring = major + minor * v.cos();
        Vec3::new(ring * u.cos(), minor * v.sin(), ring * u.sin())
    };

    let mut vertices = Vec::with_capacity(radial * tubular * 6);
    for i in 0..tubular {
        for j in 0..radial {
            let a = point(i, j);
            let b = point(i + 1, j);
            let c = point(i + 1, j + 1);
            let d = point(i, j + 1);
            push_triangle(&mut vertices, a, d, b);
            push_triangle(&mut vertices, b, d, c);
        }
    }
    vertices
}

/// Two triangles covering clip space.
pub fn fullscreen_quad() -> Vec<Vertex> {
    let corners = [
        [-1.0, -1.0],
        [1.0, -1.0],
        [1.0, 1.0],
        [-1.0, -1.0],
        [1.0, 1.0],
        [-1.0, 1.0],
    ];
    corners
        .iter()
        .map(|[x, y]| Vertex {
            position: [*x, *y, 0.0],
            normal: [0.0, 0.0, 1.0],
        })
        .collect()
}

/// Single vertex stand-in for point clouds, whose data lives in the
/// instance stream.
pub fn point_sprite() -> Vec<Vertex> {
    vec![Vertex {
        position: [0.0; 3],
        normal: [0.0, 0.0, 1.0],
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octahedron_normals_point_outwards() {
        for tri in octahedron(1.0).chunks(3) {
            let centroid = tri
                .iter()
                .fold(Vec3::ZERO, |acc, v| acc + Vec3::from(v.position))
                / 3.0;
            assert!(Vec3::from(tri[0].normal).dot(centroid) > 0.0);
        }
    }

    #[test]
    fn primitive_vertex_counts() {
        assert_eq!(octahedron(1.0).len(), 24);
        assert_eq!(shard(1.0, 0.2).len(), 18);
        assert_eq!(torus(1.0, 0.1, 8, 16).len(), 8 * 16 * 6);
        assert_eq!(fullscreen_quad().len(), 6);
    }
}
