//! Tile load error taxonomy.

use crate::TileAddress;

/// Classification of a failed tile load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileErrorKind {
    /// Transient transport failure or timeout. Retried with backoff.
    Network,
    /// Payload was malformed. Not retried.
    Decode,
    /// Tile lies outside the dataset. Never retried within a session.
    NotFound,
    /// The cache could not admit the tile. The load is deferred.
    CapacityExceeded,
}

impl TileErrorKind {
    /// Whether a load failing with this kind is worth retrying immediately.
    pub fn is_retryable(self) -> bool {
        matches!(self, TileErrorKind::Network)
    }
}

/// Structural problems found while decoding a tile payload.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("payload shorter than the {expected}-byte header ({actual} bytes)")]
    TruncatedHeader { expected: usize, actual: usize },

    #[error("bad magic {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    #[error("unknown flag bits {0:#06x}")]
    UnknownFlags(u16),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("body length {actual} does not match {vertices} vertices and {indices} indices ({expected} bytes)")]
    LengthMismatch {
        vertices: u32,
        indices: u32,
        expected: u64,
        actual: usize,
    },

    #[error("{0} vertices or indices do not form whole triangles")]
    PartialTriangle(u32),

    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: u32 },

    #[error("vertex {vertex} has a non-finite component")]
    NonFinite { vertex: u32 },

    #[error("vertex {vertex} has {channel} = {value} outside 0..=1")]
    ChannelOutOfRange {
        vertex: u32,
        channel: &'static str,
        value: f32,
    },

    #[error("decode task failed: {0}")]
    TaskFailed(String),
}

/// Errors produced while fetching or decoding a tile.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TileError {
    /// Transport failure, HTTP 5xx, or timeout.
    #[error("network error loading tile {address}: {message}")]
    Network {
        address: TileAddress,
        message: String,
    },

    /// The payload could not be decoded.
    #[error("malformed payload for tile {address}: {source}")]
    Decode {
        address: TileAddress,
        #[source]
        source: DecodeError,
    },

    /// The data source has no tile at this address.
    #[error("tile {address} not found")]
    NotFound { address: TileAddress },

    /// The cache could not make room for the tile.
    #[error("cache cannot admit tile {address}")]
    CapacityExceeded { address: TileAddress },
}

impl TileError {
    /// Build a network error.
    pub fn network(address: &TileAddress, message: impl Into<String>) -> Self {
        TileError::Network {
            address: address.clone(),
            message: message.into(),
        }
    }

    /// Build a not-found error.
    pub fn not_found(address: &TileAddress) -> Self {
        TileError::NotFound {
            address: address.clone(),
        }
    }

    /// Build a decode error.
    pub fn decode(address: &TileAddress, source: DecodeError) -> Self {
        TileError::Decode {
            address: address.clone(),
            source,
        }
    }

    /// Build a capacity error.
    pub fn capacity_exceeded(address: &TileAddress) -> Self {
        TileError::CapacityExceeded {
            address: address.clone(),
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> TileErrorKind {
        match self {
            TileError::Network { .. } => TileErrorKind::Network,
            TileError::Decode { .. } => TileErrorKind::Decode,
            TileError::NotFound { .. } => TileErrorKind::NotFound,
            TileError::CapacityExceeded { .. } => TileErrorKind::CapacityExceeded,
        }
    }

    /// Address of the tile that failed.
    pub fn address(&self) -> &TileAddress {
        match self {
            TileError::Network { address, .. }
            | TileError::Decode { address, .. }
            | TileError::NotFound { address }
            | TileError::CapacityExceeded { address } => address,
        }
    }

    /// Whether the loader should retry after this error.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_retry() {
        let addr = TileAddress::new("overworld", 0, 1, 2);
        assert!(TileError::network(&addr, "connection reset").is_retryable());
        assert!(!TileError::not_found(&addr).is_retryable());
        assert!(!TileError::decode(&addr, DecodeError::UnsupportedVersion(9)).is_retryable());
        assert!(!TileError::capacity_exceeded(&addr).is_retryable());
    }

    #[test]
    fn test_error_message_names_tile() {
        let addr = TileAddress::new("overworld", 0, 1, 2);
        let err = TileError::decode(&addr, DecodeError::PartialTriangle(4));
        let message = err.to_string();
        assert!(message.contains("overworld/0/1/2"));
        assert_eq!(err.kind(), TileErrorKind::Decode);
        assert_eq!(err.address(), &addr);
    }
}
