//! # Snapshot Format
//!
//! Binary serialization for txgraph stores.
//!
//! Format: Header (5 bytes) + postcard-serialized `SerializableGraph`.
//! - 4 bytes: Magic ("TXGR")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded.

use crate::graph::{Graph, SerializableGraph};
use crate::primitives;
use crate::types::GraphError;

/// Maximum accepted snapshot size, checked before deserialization.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes every snapshot payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(GraphError::Serialization("Invalid magic bytes".to_string()));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(GraphError::Serialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        match bytes {
            [m0, m1, m2, m3, version, ..] => Ok(Self {
                magic: [*m0, *m1, *m2, *m3],
                version: *version,
            }),
            _ => Err(GraphError::Serialization("Header too short".to_string())),
        }
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload). No file I/O.
pub fn graph_to_bytes(graph: &Graph) -> Result<Vec<u8>, GraphError> {
    let payload = postcard::to_stdvec(&SerializableGraph::from(graph))
        .map_err(|e| GraphError::Serialization(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a graph from bytes. No file I/O.
///
/// Rejects input that is shorter than the header, larger than
/// `MAX_PERSISTENCE_PAYLOAD_SIZE`, or carries a foreign header, all
/// before touching the payload.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<Graph, GraphError> {
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(GraphError::Serialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_SIZE..).unwrap_or_default();
    let serializable: SerializableGraph = postcard::from_bytes(payload).map_err(|e| {
        GraphError::Serialization(format!("Failed to deserialize graph data: {}", e))
    })?;

    Graph::try_from(serializable)
}

// =============================================================================
// TESTS
// =============================================================================
