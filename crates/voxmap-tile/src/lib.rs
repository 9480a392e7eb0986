//! Tile data model: addressing, grid geometry, decoded geometry buffers, the
//! binary payload codec, and the load error taxonomy.

mod address;
mod bounds;
pub mod codec;
mod error;
mod geometry;
mod grid;
mod tile;

pub use address::TileAddress;
pub use bounds::Aabb;
pub use codec::{decode_payload, decode_tile, encode_payload};
pub use error::{DecodeError, TileError, TileErrorKind};
pub use geometry::{TileGeometry, TileVertex};
pub use grid::TileGrid;
pub use tile::{Tile, TileState};
