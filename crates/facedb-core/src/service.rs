//! Register / recognize operations over a provider, a store and a matcher.

use crate::matcher::{FirstWithinTolerance, MatchOutcome, Matcher, DEFAULT_TOLERANCE};
use crate::provider::EmbeddingProvider;
use crate::store::EncodingStore;
use crate::types::{Embedding, RecordId};
use image::RgbImage;
use std::error::Error as StdError;
use thiserror::Error;

/// Prompt text shown in an empty label field. Never accepted as a label.
pub const LABEL_PLACEHOLDER: &str = "Enter Name";

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("please enter a valid name")]
    InvalidLabel,
    #[error("no face detected")]
    NoFaceDetected,
    #[error("embedding provider failed: {0}")]
    Provider(#[source] BoxError),
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),
}

/// A completed registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub id: RecordId,
    pub label: String,
}

/// Trim `raw` and reject empty labels and the placeholder prompt.
pub fn validate_label(raw: &str) -> Result<&str, ServiceError> {
    let label = raw.trim();
    if label.is_empty() || label == LABEL_PLACEHOLDER {
        return Err(ServiceError::InvalidLabel);
    }
    Ok(label)
}

/// Owns the embedding provider and the store handle for the lifetime of a session.
pub struct FaceService<P, S, M = FirstWithinTolerance> {
    provider: P,
    store: S,
    matcher: M,
    tolerance: f32,
}

impl<P, S> FaceService<P, S, FirstWithinTolerance>
where
    P: EmbeddingProvider,
    S: EncodingStore,
{
    /// Service with the default first-match rule and tolerance.
    pub fn new(provider: P, store: S) -> Self {
        Self::with_matcher(provider, store, FirstWithinTolerance, DEFAULT_TOLERANCE)
    }
}

impl<P, S, M> FaceService<P, S, M>
where
    P: EmbeddingProvider,
    S: EncodingStore,
    M: Matcher,
{
    pub fn with_matcher(provider: P, store: S, matcher: M, tolerance: f32) -> Self {
        Self {
            provider,
            store,
            matcher,
            tolerance,
        }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Release the provider and hand back the store for an explicit close.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Enroll the first face in `frame` under `raw_label`.
    ///
    /// The label is validated before the provider is called. Nothing is
    /// written unless an embedding was produced.
    pub fn register(&mut self, raw_label: &str, frame: &RgbImage) -> Result<Registration, ServiceError> {
        let label = validate_label(raw_label)?;
        let embedding = self.first_face_embedding(frame)?;

        let id = self
            .store
            .append(label, &embedding)
            .map_err(|e| ServiceError::Storage(Box::new(e)))?;

        tracing::info!(id, label, dim = embedding.dimension(), "registered face");
        Ok(Registration {
            id,
            label: label.to_string(),
        })
    }

    /// Compare the first face in `frame` against every enrolled sample.
    pub fn recognize(&mut self, frame: &RgbImage) -> Result<MatchOutcome, ServiceError> {
        let probe = self.first_face_embedding(frame)?;

        let gallery = self
            .store
            .scan_all()
            .map_err(|e| ServiceError::Storage(Box::new(e)))?;

        let outcome = self.matcher.compare(&probe, &gallery, self.tolerance);
        match &outcome {
            MatchOutcome::Match { id, label, distance } => {
                tracing::info!(id, label = %label, distance, "recognized face");
            }
            MatchOutcome::NoMatch => {
                tracing::info!(gallery = gallery.len(), "no match within tolerance");
            }
        }
        Ok(outcome)
    }

    fn first_face_embedding(&mut self, frame: &RgbImage) -> Result<Embedding, ServiceError> {
        let faces = self
            .provider
            .detect(frame)
            .map_err(|e| ServiceError::Provider(Box::new(e)))?;

        let Some(face) = faces.first() else {
            return Err(ServiceError::NoFaceDetected);
        };
        if faces.len() > 1 {
            tracing::debug!(count = faces.len(), "multiple faces detected; using the first");
        }

        self.provider
            .embed(frame, face)
            .map_err(|e| ServiceError::Provider(Box::new(e)))
    }
}
