//! Binary tile payload codec.
//!
//! ## Layout (little-endian)
//!
//! | Offset | Size | Field                                          |
//! |--------|------|------------------------------------------------|
//! | 0      | 4    | magic `VXMT`                                   |
//! | 4      | 2    | format version                                 |
//! | 6      | 2    | flags (bit 0: body is LZ4, size-prepended)     |
//! | 8      | 4    | vertex count `V`                               |
//! | 12     | 4    | index count `I` (0 = non-indexed)              |
//! | 16     | ...  | `V` vertices of 14 `f32`, then `I` `u32`s      |
//!
//! Vertex component order matches [`TileVertex`]. Decoding validates every
//! length against the header before allocating. A compressed body must also
//! be able to expand to its declared size at LZ4's maximum ratio, which caps
//! the allocation at a fixed multiple of the bytes actually received.

use std::borrow::Cow;

use crate::{DecodeError, Tile, TileAddress, TileError, TileGeometry, TileGrid, TileVertex};

/// Payload magic bytes.
pub const MAGIC: [u8; 4] = *b"VXMT";
/// Current payload format version.
pub const VERSION: u16 = 1;
/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 16;
/// Flag bit: body is LZ4-compressed with a prepended size.
pub const FLAG_LZ4: u16 = 0b1;

const INDEX_STRIDE: usize = std::mem::size_of::<u32>();
/// Largest output an LZ4 block can produce per input byte.
const LZ4_MAX_RATIO: u64 = 255;

/// Decode a payload into geometry, validating its structure.
pub fn decode_payload(bytes: &[u8]) -> Result<TileGeometry, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::TruncatedHeader {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    }

    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if magic != MAGIC {
        return Err(DecodeError::BadMagic { found: magic });
    }
    let version = read_u16(bytes, 4);
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let flags = read_u16(bytes, 6);
    if flags & !FLAG_LZ4 != 0 {
        return Err(DecodeError::UnknownFlags(flags));
    }
    let vertex_count = read_u32(bytes, 8);
    let index_count = read_u32(bytes, 12);

    let expected =
        vertex_count as u64 * TileVertex::STRIDE as u64 + index_count as u64 * INDEX_STRIDE as u64;
    let length_mismatch = |actual: usize| DecodeError::LengthMismatch {
        vertices: vertex_count,
        indices: index_count,
        expected,
        actual,
    };

    let raw = &bytes[HEADER_LEN..];
    let body: Cow<'_, [u8]> = if flags & FLAG_LZ4 != 0 {
        // Check the prepended size before letting lz4 allocate for it.
        if raw.len() < 4 {
            return Err(length_mismatch(raw.len()));
        }
        let declared = read_u32(raw, 0) as u64;
        if declared != expected {
            return Err(length_mismatch(declared as usize));
        }
        let compressed = (raw.len() - 4) as u64;
        if declared > compressed * LZ4_MAX_RATIO {
            return Err(DecodeError::Decompress(format!(
                "{compressed} compressed bytes cannot expand to {declared}"
            )));
        }
        let decompressed = lz4_flex::decompress_size_prepended(raw)
            .map_err(|e| DecodeError::Decompress(e.to_string()))?;
        Cow::Owned(decompressed)
    } else {
        Cow::Borrowed(raw)
    };

    if body.len() as u64 != expected {
        return Err(length_mismatch(body.len()));
    }
    if index_count % 3 != 0 {
        return Err(DecodeError::PartialTriangle(index_count));
    }
    if index_count == 0 && vertex_count % 3 != 0 {
        return Err(DecodeError::PartialTriangle(vertex_count));
    }

    let vertex_bytes = vertex_count as usize * TileVertex::STRIDE;
    let (vertex_body, index_body) = body.split_at(vertex_bytes);

    let mut vertices = Vec::with_capacity(vertex_count as usize);
    for (i, chunk) in vertex_body.chunks_exact(TileVertex::STRIDE).enumerate() {
        let vertex = decode_vertex(chunk);
        validate_vertex(i as u32, &vertex)?;
        vertices.push(vertex);
    }

    let mut indices = Vec::with_capacity(index_count as usize);
    for chunk in index_body.chunks_exact(INDEX_STRIDE) {
        let index = read_u32(chunk, 0);
        if index >= vertex_count {
            return Err(DecodeError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }
        indices.push(index);
    }

    Ok(TileGeometry::new(vertices, indices))
}

/// Decode a payload into a [`Tile`] at `address`, with bounds taken from the grid.
pub fn decode_tile(address: &TileAddress, bytes: &[u8], grid: &TileGrid) -> Result<Tile, TileError> {
    let geometry = decode_payload(bytes).map_err(|e| TileError::decode(address, e))?;
    Ok(Tile::new(address.clone(), geometry, grid.bounds(address)))
}

/// Encode geometry into a payload, optionally LZ4-compressing the body.
pub fn encode_payload(geometry: &TileGeometry, compress: bool) -> Vec<u8> {
    let mut body = Vec::with_capacity(geometry.byte_size());
    for vertex in &geometry.vertices {
        for component in vertex.to_components() {
            body.extend_from_slice(&component.to_le_bytes());
        }
    }
    for index in &geometry.indices {
        body.extend_from_slice(&index.to_le_bytes());
    }

    let flags = if compress { FLAG_LZ4 } else { 0 };
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&(geometry.vertices.len() as u32).to_le_bytes());
    out.extend_from_slice(&(geometry.indices.len() as u32).to_le_bytes());
    if compress {
        out.extend_from_slice(&lz4_flex::compress_prepend_size(&body));
    } else {
        out.extend_from_slice(&body);
    }
    out
}

fn decode_vertex(chunk: &[u8]) -> TileVertex {
    let mut components = [0.0f32; TileVertex::COMPONENTS];
    for (component, bytes) in components.iter_mut().zip(chunk.chunks_exact(4)) {
        *component = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    TileVertex::from_components(components)
}

fn validate_vertex(index: u32, vertex: &TileVertex) -> Result<(), DecodeError> {
    if vertex.to_components().iter().any(|c| !c.is_finite()) {
        return Err(DecodeError::NonFinite { vertex: index });
    }
    for (channel, value) in [
        ("ao", vertex.ao),
        ("sunlight", vertex.sunlight),
        ("blocklight", vertex.blocklight),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(DecodeError::ChannelOutOfRange {
                vertex: index,
                channel,
                value,
            });
        }
    }
    Ok(())
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
