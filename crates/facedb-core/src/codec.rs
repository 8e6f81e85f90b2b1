//! Binary layout for persisted embeddings.
//!
//! Version 1, all integers and floats little-endian:
//!
//! ```text
//! +---------+----------------+---------------------------+
//! | version | dimension: u32 | dimension × f32 values    |
//! |  1 byte |    4 bytes     |   4 × dimension bytes     |
//! +---------+----------------+---------------------------+
//! ```

use crate::types::Embedding;
use thiserror::Error;

/// Current blob layout version.
pub const BLOB_VERSION: u8 = 1;

const HEADER_LEN: usize = 1 + 4;
const VALUE_LEN: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("embedding blob is empty")]
    Empty,
    #[error("unsupported embedding blob version {0} (expected {BLOB_VERSION})")]
    UnsupportedVersion(u8),
    #[error("embedding blob header truncated: {0} bytes")]
    TruncatedHeader(usize),
    #[error("embedding blob payload length mismatch: dimension {dimension} needs {expected} bytes, got {actual}")]
    LengthMismatch {
        dimension: u32,
        expected: usize,
        actual: usize,
    },
    #[error("embedding dimension {0} does not fit the blob header")]
    DimensionTooLarge(usize),
}

/// Serialize an embedding's values into a version-1 blob.
pub fn encode_embedding(embedding: &Embedding) -> Result<Vec<u8>, CodecError> {
    let dimension = u32::try_from(embedding.dimension())
        .map_err(|_| CodecError::DimensionTooLarge(embedding.dimension()))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + embedding.dimension() * VALUE_LEN);
    blob.push(BLOB_VERSION);
    blob.extend_from_slice(&dimension.to_le_bytes());
    for value in &embedding.values {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    Ok(blob)
}

/// Parse a blob produced by [`encode_embedding`].
pub fn decode_embedding(blob: &[u8]) -> Result<Embedding, CodecError> {
    let (&version, rest) = blob.split_first().ok_or(CodecError::Empty)?;
    if version != BLOB_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    if rest.len() < 4 {
        return Err(CodecError::TruncatedHeader(blob.len()));
    }
    let (dim_bytes, payload) = rest.split_at(4);
    let dimension = u32::from_le_bytes([dim_bytes[0], dim_bytes[1], dim_bytes[2], dim_bytes[3]]);

    let expected = dimension as usize * VALUE_LEN;
    if payload.len() != expected {
        return Err(CodecError::LengthMismatch {
            dimension,
            expected,
            actual: payload.len(),
        });
    }

    let values = payload
        .chunks_exact(VALUE_LEN)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(Embedding::new(values))
}
