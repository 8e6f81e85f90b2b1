use crate::types::{Embedding, FaceRecord, RecordId};

/// Persistence contract for enrolled face samples.
///
/// `append` must be durable before it returns. `scan_all` re-reads the full
/// current state on every call, in insertion order.
pub trait EncodingStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn append(&mut self, label: &str, embedding: &Embedding) -> Result<RecordId, Self::Error>;

    fn scan_all(&self) -> Result<Vec<FaceRecord>, Self::Error>;
}
