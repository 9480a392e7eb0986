//! Shading contract for tile and marker rendering.
//!
//! Exposes the per-vertex attribute layout every tile pipeline must consume,
//! the marker distance-fade uniform and its reference evaluation, and a typed
//! shader module composer with the reference WGSL programs.

pub mod fade;
pub mod shader;
pub mod vertex_layout;

pub use fade::{MarkerFade, fade_opacity};
pub use shader::{
    ComposedShader, ShaderChunk, ShaderComposer, ShaderError, ShaderModule, ShaderStage,
    StageKind, marker_fill_module, tile_module,
};
pub use vertex_layout::{TILE_VERTEX_ATTRIBUTES, TILE_VERTEX_LAYOUT, TileAttribute};
