//! facedb-core: Face enrollment and first-match recognition.
//!
//! Matching rule, embedding blob codec, the provider/store seams and the
//! register/recognize service. Ships an ONNX provider built on SCRFD
//! detection and ArcFace embeddings.

pub mod codec;
pub mod detector;
pub mod matcher;
pub mod provider;
pub mod recognizer;
pub mod service;
pub mod store;
pub mod types;

pub use matcher::{distance_for_cosine, MatchOutcome, MatchStrategy, Matcher, DEFAULT_TOLERANCE};
pub use provider::{EmbeddingProvider, OnnxProvider};
pub use service::{FaceService, Registration, ServiceError, LABEL_PLACEHOLDER};
pub use store::EncodingStore;
pub use types::{BoundingBox, Embedding, FaceRecord, RecordId};
