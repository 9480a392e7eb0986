//! Canonical `wgpu::VertexBufferLayout` for tile geometry.
//!
//! Every tile pipeline references [`TILE_VERTEX_LAYOUT`] so shader locations
//! stay in lockstep with [`TileVertex`].
//!
//! ## Attribute Packing
//!
//! | Location | Offset | Format    | Field      |
//! |----------|--------|-----------|------------|
//! | 0        | 0      | Float32x3 | position   |
//! | 1        | 12     | Float32x3 | normal     |
//! | 2        | 24     | Float32x2 | uv         |
//! | 3        | 32     | Float32x3 | color      |
//! | 4        | 44     | Float32   | ao         |
//! | 5        | 48     | Float32   | sunlight   |
//! | 6        | 52     | Float32   | blocklight |

use std::mem;

use voxmap_tile::TileVertex;
use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

/// Named per-vertex inputs of the tile shading contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileAttribute {
    Position,
    Normal,
    Uv,
    Color,
    Ao,
    Sunlight,
    Blocklight,
}

impl TileAttribute {
    /// All attributes in shader-location order.
    pub const ALL: [TileAttribute; 7] = [
        TileAttribute::Position,
        TileAttribute::Normal,
        TileAttribute::Uv,
        TileAttribute::Color,
        TileAttribute::Ao,
        TileAttribute::Sunlight,
        TileAttribute::Blocklight,
    ];

    /// Shader location the attribute is bound to.
    pub const fn location(self) -> u32 {
        self as u32
    }

    /// Name used for the attribute in shader sources.
    pub const fn name(self) -> &'static str {
        match self {
            TileAttribute::Position => "position",
            TileAttribute::Normal => "normal",
            TileAttribute::Uv => "uv",
            TileAttribute::Color => "color",
            TileAttribute::Ao => "ao",
            TileAttribute::Sunlight => "sunlight",
            TileAttribute::Blocklight => "blocklight",
        }
    }

    /// The vertex attribute descriptor for this input.
    pub const fn descriptor(self) -> VertexAttribute {
        TILE_VERTEX_ATTRIBUTES[self as usize]
    }
}

/// Vertex attributes covering all 56 bytes of [`TileVertex`].
pub const TILE_VERTEX_ATTRIBUTES: [VertexAttribute; 7] = [
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: mem::offset_of!(TileVertex, position) as u64,
        shader_location: 0,
    },
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: mem::offset_of!(TileVertex, normal) as u64,
        shader_location: 1,
    },
    VertexAttribute {
        format: VertexFormat::Float32x2,
        offset: mem::offset_of!(TileVertex, uv) as u64,
        shader_location: 2,
    },
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: mem::offset_of!(TileVertex, color) as u64,
        shader_location: 3,
    },
    VertexAttribute {
        format: VertexFormat::Float32,
        offset: mem::offset_of!(TileVertex, ao) as u64,
        shader_location: 4,
    },
    VertexAttribute {
        format: VertexFormat::Float32,
        offset: mem::offset_of!(TileVertex, sunlight) as u64,
        shader_location: 5,
    },
    VertexAttribute {
        format: VertexFormat::Float32,
        offset: mem::offset_of!(TileVertex, blocklight) as u64,
        shader_location: 6,
    },
];

/// The vertex buffer layout for all tile render pipelines.
pub const TILE_VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: mem::size_of::<TileVertex>() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &TILE_VERTEX_ATTRIBUTES,
};

// ---------------------------------------------------------------------------
// Compile-time validation
// ---------------------------------------------------------------------------

static_assertions::const_assert_eq!(mem::size_of::<TileVertex>(), 56);
static_assertions::const_assert_eq!(TILE_VERTEX_ATTRIBUTES[0].offset, 0);
static_assertions::const_assert_eq!(TILE_VERTEX_ATTRIBUTES[1].offset, 12);
static_assertions::const_assert_eq!(TILE_VERTEX_ATTRIBUTES[2].offset, 24);
static_assertions::const_assert_eq!(TILE_VERTEX_ATTRIBUTES[3].offset, 32);
static_assertions::const_assert_eq!(TILE_VERTEX_ATTRIBUTES[4].offset, 44);
static_assertions::const_assert_eq!(TILE_VERTEX_ATTRIBUTES[5].offset, 48);
static_assertions::const_assert_eq!(TILE_VERTEX_ATTRIBUTES[6].offset, 52);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_stride_matches_vertex_struct_size() {
        assert_eq!(TILE_VERTEX_LAYOUT.array_stride, TileVertex::STRIDE as u64);
        assert_eq!(TILE_VERTEX_LAYOUT.step_mode, VertexStepMode::Vertex);
    }

    #[test]
    fn test_attributes_tile_the_stride_without_gaps() {
        let mut expected_offset = 0;
        for attr in TILE_VERTEX_ATTRIBUTES {
            assert_eq!(attr.offset, expected_offset);
            expected_offset += attr.format.size();
        }
        assert_eq!(expected_offset, TILE_VERTEX_LAYOUT.array_stride);
    }

    #[test]
    fn test_shader_locations_are_sequential() {
        for (i, attr) in TILE_VERTEX_ATTRIBUTES.iter().enumerate() {
            assert_eq!(attr.shader_location, i as u32);
        }
    }

    #[test]
    fn test_named_attributes_match_descriptors() {
        assert_eq!(TileAttribute::Ao.location(), 4);
        assert_eq!(TileAttribute::Sunlight.descriptor().offset, 48);
        assert_eq!(TileAttribute::Blocklight.descriptor().format, VertexFormat::Float32);
        let names: Vec<_> = TileAttribute::ALL.iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            ["position", "normal", "uv", "color", "ao", "sunlight", "blocklight"]
        );
    }
}
