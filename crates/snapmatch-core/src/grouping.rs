//! Single-pass face grouping over a remote comparison service.
//!
//! Walks the images left to right. Each unassigned image with at least one
//! face seeds a group and is compared against every other unassigned image
//! with faces; matches join the group and are assigned immediately. The seed
//! is assigned once its scan completes. Membership is not transitively
//! closed: A~B and B~C does not imply A and C share a group.

use crate::keys::is_supported_raster;
use crate::types::{FaceGroup, StoredImage};
use crate::vision::{compare, CompareOutcome, FaceVision, PassStats};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

pub const DEFAULT_GROUP_THRESHOLD: f32 = 90.0;

/// Groups produced by one pass plus its comparison counters.
#[derive(Debug, Clone, Serialize)]
pub struct Grouping {
    pub groups: Vec<FaceGroup>,
    pub stats: PassStats,
}

/// Partition `images` into groups believed to share a face.
///
/// Comparisons are issued sequentially. Any outcome other than
/// [`CompareOutcome::Matched`] leaves the candidate unassigned.
pub async fn group_faces<V>(vision: &V, images: &[StoredImage], threshold: f32) -> Grouping
where
    V: FaceVision + ?Sized,
{
    let mut assigned: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();
    let mut stats = PassStats::default();

    for seed in images {
        if assigned.contains(seed.key.as_str()) || !seed.has_faces() {
            continue;
        }

        let mut members = vec![seed.clone()];

        for candidate in images {
            if candidate.key == seed.key
                || assigned.contains(candidate.key.as_str())
                || !candidate.has_faces()
            {
                continue;
            }

            if !is_supported_raster(&seed.key) || !is_supported_raster(&candidate.key) {
                tracing::debug!(
                    seed = %seed.key,
                    candidate = %candidate.key,
                    "skipping pair: unsupported image format"
                );
                stats.record(&CompareOutcome::Skipped("unsupported image format".into()));
                continue;
            }

            stats.compared += 1;
            let outcome = compare(vision, &seed.key, &candidate.key, threshold).await;
            stats.record(&outcome);

            if let CompareOutcome::Matched(similarity) = outcome {
                tracing::debug!(
                    seed = %seed.key,
                    candidate = %candidate.key,
                    similarity,
                    "candidate joins group"
                );
                members.push(candidate.clone());
                assigned.insert(candidate.key.as_str());
            }
        }

        assigned.insert(seed.key.as_str());
        groups.push(FaceGroup {
            face_id: format!("group-{}", Uuid::new_v4().simple()),
            images: members,
        });
    }

    tracing::info!(
        images = images.len(),
        groups = groups.len(),
        compared = stats.compared,
        matched = stats.matched,
        skipped = stats.skipped,
        failed = stats.failed,
        "face grouping complete"
    );

    Grouping { groups, stats }
}
