//! Face-vision seam and tagged comparison outcomes.
//!
//! The remote service does all detection and comparison. Callers never see
//! a raw comparison error: [`compare`] folds each call into a
//! [`CompareOutcome`] so one bad candidate cannot abort a pass.

use crate::types::{FaceDetail, FaceMatch};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    #[error("invalid image format: {0}")]
    InvalidImageFormat(String),
    /// Typically raised when one of the images contains no face.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("vision service error: {0}")]
    Service(String),
}

/// Hosted face detection and comparison, addressed by object key.
#[async_trait]
pub trait FaceVision: Send + Sync {
    /// Detect faces with the service's default attribute set.
    async fn detect_faces(&self, key: &str) -> Result<Vec<FaceDetail>, VisionError>;

    /// Compare the faces of `source` against those in `target`. Only pairs at
    /// or above `threshold` are returned.
    async fn compare_faces(
        &self,
        source: &str,
        target: &str,
        threshold: f32,
    ) -> Result<Vec<FaceMatch>, VisionError>;
}

/// Result of one pairwise comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum CompareOutcome {
    /// Best similarity across the returned face pairs.
    Matched(f32),
    NotMatched,
    /// The pair was not comparable (format, missing face).
    Skipped(String),
    Failed(String),
}

impl CompareOutcome {
    pub fn similarity(&self) -> Option<f32> {
        match self {
            CompareOutcome::Matched(s) => Some(*s),
            _ => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, CompareOutcome::Matched(_))
    }
}

/// Counters for a grouping or matching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Remote comparison calls issued.
    pub compared: usize,
    pub matched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PassStats {
    pub fn record(&mut self, outcome: &CompareOutcome) {
        match outcome {
            CompareOutcome::Matched(_) => self.matched += 1,
            CompareOutcome::NotMatched => {}
            CompareOutcome::Skipped(_) => self.skipped += 1,
            CompareOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Issue one comparison and classify the response.
pub async fn compare<V>(vision: &V, source: &str, target: &str, threshold: f32) -> CompareOutcome
where
    V: FaceVision + ?Sized,
{
    match vision.compare_faces(source, target, threshold).await {
        Ok(matches) => best_similarity(&matches)
            .map(CompareOutcome::Matched)
            .unwrap_or(CompareOutcome::NotMatched),
        Err(VisionError::InvalidImageFormat(msg)) => {
            tracing::debug!(source, target, %msg, "comparison skipped: invalid image format");
            CompareOutcome::Skipped(format!("invalid image format: {msg}"))
        }
        Err(VisionError::InvalidParameter(msg)) => {
            tracing::debug!(source, target, %msg, "comparison skipped: no face detected");
            CompareOutcome::Skipped(format!("no face detected: {msg}"))
        }
        Err(VisionError::Service(msg)) => {
            tracing::warn!(source, target, error = %msg, "comparison failed; treating as no match");
            CompareOutcome::Failed(msg)
        }
    }
}

fn best_similarity(matches: &[FaceMatch]) -> Option<f32> {
    matches
        .iter()
        .map(|m| m.similarity)
        .fold(None, |best, s| match best {
            Some(b) if b >= s => Some(b),
            _ => Some(s),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<Vec<FaceMatch>, VisionError>);

    #[async_trait]
    impl FaceVision for Fixed {
        async fn detect_faces(&self, _key: &str) -> Result<Vec<FaceDetail>, VisionError> {
            Ok(vec![])
        }

        async fn compare_faces(
            &self,
            _source: &str,
            _target: &str,
            _threshold: f32,
        ) -> Result<Vec<FaceMatch>, VisionError> {
            self.0.clone()
        }
    }

    fn sims(values: &[f32]) -> Vec<FaceMatch> {
        values.iter().map(|&similarity| FaceMatch { similarity }).collect()
    }

    #[tokio::test]
    async fn test_best_of_multiple_face_pairs() {
        let vision = Fixed(Ok(sims(&[96.0, 99.5, 97.0])));
        assert_eq!(compare(&vision, "a", "b", 95.0).await, CompareOutcome::Matched(99.5));
    }

    #[tokio::test]
    async fn test_empty_response_is_no_match() {
        let vision = Fixed(Ok(vec![]));
        assert_eq!(compare(&vision, "a", "b", 95.0).await, CompareOutcome::NotMatched);
    }

    #[tokio::test]
    async fn test_error_classification() {
        let vision = Fixed(Err(VisionError::InvalidImageFormat("gif".into())));
        assert!(matches!(compare(&vision, "a", "b", 90.0).await, CompareOutcome::Skipped(_)));

        let vision = Fixed(Err(VisionError::InvalidParameter("no face".into())));
        assert!(matches!(compare(&vision, "a", "b", 90.0).await, CompareOutcome::Skipped(_)));

        let vision = Fixed(Err(VisionError::Service("throttled".into())));
        assert_eq!(
            compare(&vision, "a", "b", 90.0).await,
            CompareOutcome::Failed("throttled".into())
        );
    }

    #[test]
    fn test_pass_stats_record() {
        let mut stats = PassStats::default();
        stats.record(&CompareOutcome::Matched(99.0));
        stats.record(&CompareOutcome::NotMatched);
        stats.record(&CompareOutcome::Skipped("x".into()));
        stats.record(&CompareOutcome::Failed("y".into()));
        assert_eq!(
            stats,
            PassStats { compared: 0, matched: 1, skipped: 1, failed: 1 }
        );
    }
}
