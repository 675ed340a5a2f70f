//! Selfie matching: compare one selfie against every image a user stored.

use crate::identity::Identity;
use crate::keys::PublicUrls;
use crate::storage::{object_keys, ObjectStore, StorageError};
use crate::types::SelfieMatch;
use crate::vision::{compare, CompareOutcome, FaceVision, PassStats};
use serde::Serialize;

pub const DEFAULT_SELFIE_THRESHOLD: f32 = 95.0;

/// Result of a selfie-match pass.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    /// Sorted by similarity, highest first; all at or above the threshold.
    pub matches: Vec<SelfieMatch>,
    /// Number of candidate images considered.
    pub processed: usize,
    pub stats: PassStats,
}

impl MatchReport {
    pub fn urls(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.url.clone()).collect()
    }

    pub fn message(&self) -> String {
        format!(
            "Found {} high-confidence matches out of {} images processed.",
            self.matches.len(),
            self.processed
        )
    }
}

/// Candidate keys for matching: the user's objects minus selfies and folder markers.
pub fn candidate_keys(identity: &Identity, keys: Vec<String>) -> Vec<String> {
    object_keys(&identity.root_prefix(), keys)
        .into_iter()
        .filter(|k| !k.contains("/selfies/"))
        .collect()
}

/// Compare the uploaded selfie `selfie_file_name` against each of the
/// user's stored images.
///
/// Calls are sequential. A per-candidate failure is recorded and skipped;
/// only a listing failure aborts the pass.
pub async fn match_selfie<S, V>(
    store: &S,
    vision: &V,
    urls: &PublicUrls,
    identity: &Identity,
    selfie_file_name: &str,
    threshold: f32,
) -> Result<MatchReport, StorageError>
where
    S: ObjectStore + ?Sized,
    V: FaceVision + ?Sized,
{
    let source = format!("{}{selfie_file_name}", identity.selfie_prefix());
    let candidates = candidate_keys(identity, store.list(&identity.root_prefix()).await?);

    let mut stats = PassStats::default();
    let mut matches = Vec::new();

    for key in &candidates {
        stats.compared += 1;
        let outcome = compare(vision, &source, key, threshold).await;
        stats.record(&outcome);
        if let CompareOutcome::Matched(similarity) = outcome {
            tracing::debug!(key = %key, similarity, "selfie match");
            matches.push(SelfieMatch {
                url: urls.url_for(key),
                similarity,
            });
        }
    }

    // The service already applies the threshold; enforce it again locally.
    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches.retain(|m| m.similarity >= threshold);

    let report = MatchReport {
        matches,
        processed: candidates.len(),
        stats,
    };
    tracing::info!(
        selfie = %source,
        matched = report.matches.len(),
        processed = report.processed,
        skipped = stats.skipped,
        failed = stats.failed,
        "selfie matching complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryObjectStore, ScriptedVision};
    use crate::vision::VisionError;

    const SELFIE: &str = "user/ann_example_com/selfies/1-me.jpg";

    fn identity() -> Identity {
        Identity::new(Some("ann@example.com".into()), None, None).unwrap()
    }

    fn seeded_store(keys: &[&str]) -> MemoryObjectStore {
        let store = MemoryObjectStore::new();
        for key in keys {
            store.insert(key, vec![0u8], "image/jpeg");
        }
        store
    }

    #[tokio::test]
    async fn test_zero_stored_images() {
        let store = MemoryObjectStore::new();
        let vision = ScriptedVision::new();
        let report = match_selfie(
            &store,
            &vision,
            &PublicUrls::for_bucket("bkt"),
            &identity(),
            "1-me.jpg",
            DEFAULT_SELFIE_THRESHOLD,
        )
        .await
        .unwrap();

        assert!(report.urls().is_empty());
        assert_eq!(
            report.message(),
            "Found 0 high-confidence matches out of 0 images processed."
        );
        assert!(vision.compare_calls().is_empty());
    }

    #[tokio::test]
    async fn test_results_sorted_and_filtered() {
        let store = seeded_store(&[
            "user/ann_example_com/",
            "user/ann_example_com/1-a.jpg",
            "user/ann_example_com/2-b.jpg",
            "user/ann_example_com/42/3-c.jpg",
            "user/ann_example_com/4-d.jpg",
            SELFIE,
        ]);
        let vision = ScriptedVision::new()
            .with_match(SELFIE, "user/ann_example_com/1-a.jpg", &[96.0])
            .with_match(SELFIE, "user/ann_example_com/2-b.jpg", &[94.0])
            .with_match(SELFIE, "user/ann_example_com/42/3-c.jpg", &[91.0, 99.2]);
        let urls = PublicUrls::for_bucket("bkt");

        let report = match_selfie(
            &store,
            &vision,
            &urls,
            &identity(),
            "1-me.jpg",
            DEFAULT_SELFIE_THRESHOLD,
        )
        .await
        .unwrap();

        assert_eq!(
            report.urls(),
            vec![
                urls.url_for("user/ann_example_com/42/3-c.jpg"),
                urls.url_for("user/ann_example_com/1-a.jpg"),
            ]
        );
        assert!(report
            .matches
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
        assert!(report.matches.iter().all(|m| m.similarity >= 95.0));
        assert_eq!(report.processed, 4);
        assert_eq!(
            report.message(),
            "Found 2 high-confidence matches out of 4 images processed."
        );
    }

    #[tokio::test]
    async fn test_selfies_and_prefix_marker_excluded() {
        let store = seeded_store(&[
            "user/ann_example_com/",
            "user/ann_example_com/selfies/0-old.jpg",
            "user/ann_example_com/1-a.jpg",
            SELFIE,
        ]);
        let vision = ScriptedVision::new();

        match_selfie(
            &store,
            &vision,
            &PublicUrls::for_bucket("bkt"),
            &identity(),
            "1-me.jpg",
            DEFAULT_SELFIE_THRESHOLD,
        )
        .await
        .unwrap();

        assert_eq!(
            vision.compare_calls(),
            vec![(SELFIE.to_string(), "user/ann_example_com/1-a.jpg".to_string(), 95.0)]
        );
    }

    #[tokio::test]
    async fn test_candidate_failures_do_not_abort() {
        let store = seeded_store(&[
            "user/ann_example_com/1-a.jpg",
            "user/ann_example_com/2-b.jpg",
            "user/ann_example_com/3-c.jpg",
        ]);
        let vision = ScriptedVision::new()
            .with_compare_error(
                SELFIE,
                "user/ann_example_com/1-a.jpg",
                VisionError::InvalidParameter("no face".into()),
            )
            .with_compare_error(
                SELFIE,
                "user/ann_example_com/2-b.jpg",
                VisionError::Service("timeout".into()),
            )
            .with_match(SELFIE, "user/ann_example_com/3-c.jpg", &[97.0]);

        let report = match_selfie(
            &store,
            &vision,
            &PublicUrls::for_bucket("bkt"),
            &identity(),
            "1-me.jpg",
            DEFAULT_SELFIE_THRESHOLD,
        )
        .await
        .unwrap();

        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.stats.compared, 3);
        assert_eq!(report.stats.skipped, 1);
        assert_eq!(report.stats.failed, 1);
    }

    #[test]
    fn test_candidate_keys_excludes_other_users_markers() {
        let keys = vec![
            "user/ann_example_com/".to_string(),
            "user/ann_example_com/42/".to_string(),
            "user/ann_example_com/42/a.jpg".to_string(),
            "user/ann_example_com/selfies/me.jpg".to_string(),
        ];
        assert_eq!(
            candidate_keys(&identity(), keys),
            vec!["user/ann_example_com/42/a.jpg"]
        );
    }
}
