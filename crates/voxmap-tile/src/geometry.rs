//! Decoded tile geometry buffers.

use std::mem;

use glam::Vec3;

use crate::Aabb;

/// A single tile vertex, laid out for direct GPU upload.
///
/// Layout (56 bytes total, all `f32`):
///   - `[0..12]`  position xyz (world space)
///   - `[12..24]` normal xyz
///   - `[24..32]` uv
///   - `[32..44]` color rgb (linear, 0..=1)
///   - `[44..48]` ao (0 = fully occluded, 1 = unoccluded)
///   - `[48..52]` sunlight (0..=1)
///   - `[52..56]` blocklight (0..=1)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 3],
    pub ao: f32,
    pub sunlight: f32,
    pub blocklight: f32,
}

static_assertions::assert_eq_size!(TileVertex, [u8; 56]);

impl TileVertex {
    /// Size of one vertex in bytes, in memory and on the wire.
    pub const STRIDE: usize = mem::size_of::<TileVertex>();

    /// Number of `f32` components per vertex.
    pub const COMPONENTS: usize = Self::STRIDE / mem::size_of::<f32>();

    /// Flatten to the wire/GPU component order.
    pub fn to_components(&self) -> [f32; Self::COMPONENTS] {
        let [px, py, pz] = self.position;
        let [nx, ny, nz] = self.normal;
        let [u, v] = self.uv;
        let [r, g, b] = self.color;
        [
            px,
            py,
            pz,
            nx,
            ny,
            nz,
            u,
            v,
            r,
            g,
            b,
            self.ao,
            self.sunlight,
            self.blocklight,
        ]
    }

    /// Rebuild a vertex from components in wire order.
    pub fn from_components(c: [f32; Self::COMPONENTS]) -> Self {
        Self {
            position: [c[0], c[1], c[2]],
            normal: [c[3], c[4], c[5]],
            uv: [c[6], c[7]],
            color: [c[8], c[9], c[10]],
            ao: c[11],
            sunlight: c[12],
            blocklight: c[13],
        }
    }
}

/// Renderable geometry of one tile: interleaved vertices plus an optional
/// triangle index list. An empty `indices` means non-indexed triangles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileGeometry {
    pub vertices: Vec<TileVertex>,
    pub indices: Vec<u32>,
}

impl TileGeometry {
    /// Create geometry from vertex and index buffers.
    pub fn new(vertices: Vec<TileVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles, indexed or not.
    pub fn triangle_count(&self) -> usize {
        if self.indices.is_empty() {
            self.vertices.len() / 3
        } else {
            self.indices.len() / 3
        }
    }

    /// Whether the tile has nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Bytes occupied by the vertex and index buffers.
    pub fn byte_size(&self) -> usize {
        self.vertices.len() * TileVertex::STRIDE + self.indices.len() * mem::size_of::<u32>()
    }

    /// Vertex buffer as raw bytes for GPU upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index buffer as raw bytes for GPU upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Tight bounds of the vertex positions, `None` for empty geometry.
    pub fn compute_bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|v| Vec3::from(v.position)))
    }
}
