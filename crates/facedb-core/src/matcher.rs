//! Match / no-match decision over the enrolled gallery.
//!
//! A stored record is a candidate when its Euclidean distance to the probe
//! is at most the tolerance. The default strategy returns the first
//! candidate in retrieval order, not the closest one.

use crate::types::{Embedding, FaceRecord, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default Euclidean tolerance for a positive match.
///
/// Tuned for unnormalised 128-d embeddings. For unit-length embeddings it
/// demands a cosine similarity of at least 0.875; see [`distance_for_cosine`].
pub const DEFAULT_TOLERANCE: f32 = 0.5;

/// Euclidean distance between two unit-length embeddings whose cosine
/// similarity is `similarity`: `sqrt(2 - 2 cos)`.
pub fn distance_for_cosine(similarity: f32) -> f32 {
    (2.0 - 2.0 * similarity.clamp(-1.0, 1.0)).sqrt()
}

/// Outcome of comparing one probe against the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Match {
        id: RecordId,
        label: String,
        distance: f32,
    },
    NoMatch,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Match { .. })
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            MatchOutcome::Match { label, .. } => Some(label),
            MatchOutcome::NoMatch => None,
        }
    }
}

/// Strategy for comparing a probe embedding against a gallery of enrolled faces.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[FaceRecord], tolerance: f32) -> MatchOutcome;
}

/// Returns the first gallery entry within tolerance, scanning in retrieval order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstWithinTolerance;

impl Matcher for FirstWithinTolerance {
    fn compare(&self, probe: &Embedding, gallery: &[FaceRecord], tolerance: f32) -> MatchOutcome {
        for record in gallery {
            let Some(distance) = comparable_distance(probe, record) else {
                continue;
            };
            if distance <= tolerance {
                return MatchOutcome::Match {
                    id: record.id,
                    label: record.label.clone(),
                    distance,
                };
            }
        }
        MatchOutcome::NoMatch
    }
}

/// Returns the closest gallery entry, provided it is within tolerance.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestWithinTolerance;

impl Matcher for NearestWithinTolerance {
    fn compare(&self, probe: &Embedding, gallery: &[FaceRecord], tolerance: f32) -> MatchOutcome {
        let mut best: Option<(&FaceRecord, f32)> = None;

        for record in gallery {
            let Some(distance) = comparable_distance(probe, record) else {
                continue;
            };
            // Strict `<` keeps the earliest record on ties.
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((record, distance));
            }
        }

        match best {
            Some((record, distance)) if distance <= tolerance => MatchOutcome::Match {
                id: record.id,
                label: record.label.clone(),
                distance,
            },
            _ => MatchOutcome::NoMatch,
        }
    }
}

/// Distance to a stored record, or `None` when the dimensions disagree.
fn comparable_distance(probe: &Embedding, record: &FaceRecord) -> Option<f32> {
    if record.embedding.dimension() != probe.dimension() {
        tracing::warn!(
            id = record.id,
            stored = record.embedding.dimension(),
            probe = probe.dimension(),
            "skipping record with mismatched embedding dimension"
        );
        return None;
    }
    Some(probe.euclidean_distance(&record.embedding))
}

/// Configurable selection between the two matcher strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    #[default]
    First,
    Nearest,
}

impl MatchStrategy {
    pub fn matcher(self) -> Box<dyn Matcher> {
        match self {
            MatchStrategy::First => Box::new(FirstWithinTolerance),
            MatchStrategy::Nearest => Box::new(NearestWithinTolerance),
        }
    }
}

impl Matcher for Box<dyn Matcher> {
    fn compare(&self, probe: &Embedding, gallery: &[FaceRecord], tolerance: f32) -> MatchOutcome {
        (**self).compare(probe, gallery, tolerance)
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::First => write!(f, "first"),
            MatchStrategy::Nearest => write!(f, "nearest"),
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(MatchStrategy::First),
            "nearest" => Ok(MatchStrategy::Nearest),
            other => Err(format!("unknown match strategy: {other} (expected first or nearest)")),
        }
    }
}
