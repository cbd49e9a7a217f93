//! Read-only roadmap aggregation.
//!
//! Features come straight from the sheet export, votes from the cache
//! mirror. Grouping and ranking are pure functions recomputed on demand;
//! there is no derived state to invalidate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::KvStore;
use crate::errors::AppError;
use crate::models::{Feature, Vote};
use crate::store::SheetStore;

pub const VOTE_KEY_PREFIX: &str = "vote:";

#[derive(Debug, Serialize)]
pub struct Roadmap {
    pub features: Vec<Feature>,
    pub votes: Vec<Vote>,
}

/// Status buckets a roadmap view can be narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusFilter {
    NeedsFeedback,
    InProgress,
    IsComplete,
}

impl StatusFilter {
    fn matches(self, feature: &Feature) -> bool {
        match self {
            StatusFilter::NeedsFeedback => feature.needs_feedback,
            StatusFilter::InProgress => !feature.needs_feedback && feature.in_progress,
            StatusFilter::IsComplete => !feature.needs_feedback && feature.is_complete,
        }
    }
}

/// Aggregate the full feature and vote sets, optionally narrowed to one
/// status bucket. Reads are unauthenticated and eventually consistent
/// with recorded writes.
pub async fn list_roadmap(
    sheet: &SheetStore,
    kv: &dyn KvStore,
    filter: Option<StatusFilter>,
) -> Result<Roadmap, AppError> {
    let mut features = sheet.fetch_features().await?;
    if let Some(filter) = filter {
        features.retain(|f| filter.matches(f));
    }
    let votes = cached_votes(kv).await?;
    Ok(Roadmap { features, votes })
}

/// All votes mirrored in the cache. Entries that fail to deserialize are
/// skipped rather than failing the whole read.
pub async fn cached_votes(kv: &dyn KvStore) -> Result<Vec<Vote>, AppError> {
    let entries = kv.list_prefix(VOTE_KEY_PREFIX).await?;
    Ok(entries
        .into_iter()
        .filter_map(|(_, raw)| serde_json::from_str(&raw).ok())
        .collect())
}

pub fn vote_counts(votes: &[Vote]) -> HashMap<Uuid, usize> {
    let mut counts = HashMap::new();
    for vote in votes {
        *counts.entry(vote.feature_uuid).or_insert(0) += 1;
    }
    counts
}

/// Features ordered by descending vote count; ties keep newest first.
pub fn sorted_by_votes(features: &[Feature], votes: &[Vote]) -> Vec<Feature> {
    let counts = vote_counts(votes);
    let mut sorted = features.to_vec();
    sorted.sort_by(|a, b| {
        let ca = counts.get(&a.uuid).copied().unwrap_or(0);
        let cb = counts.get(&b.uuid).copied().unwrap_or(0);
        cb.cmp(&ca).then(b.timestamp.cmp(&a.timestamp))
    });
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(ts: i64) -> Feature {
        Feature::new("T".into(), "D".into(), ts)
    }

    fn vote_for(f: &Feature, hash: &str) -> Vote {
        Vote::new(hash.into(), f.uuid, f.timestamp, None)
    }

    #[test]
    fn vote_counts_group_by_feature() {
        let a = feature(1);
        let b = feature(2);
        let votes = vec![vote_for(&a, "x"), vote_for(&a, "y"), vote_for(&b, "x")];
        let counts = vote_counts(&votes);
        assert_eq!(counts[&a.uuid], 2);
        assert_eq!(counts[&b.uuid], 1);
    }

    #[test]
    fn sorted_by_votes_is_descending() {
        let a = feature(1);
        let b = feature(2);
        let votes = vec![vote_for(&b, "x"), vote_for(&b, "y"), vote_for(&a, "z")];
        let sorted = sorted_by_votes(&[a.clone(), b.clone()], &votes);
        assert_eq!(sorted[0].uuid, b.uuid);
        assert_eq!(sorted[1].uuid, a.uuid);
    }

    #[test]
    fn status_filters_partition_features() {
        let mut complete = feature(1);
        complete.needs_feedback = false;
        complete.is_complete = true;
        let mut in_progress = feature(2);
        in_progress.needs_feedback = false;
        in_progress.in_progress = true;
        let fresh = feature(3);

        assert!(StatusFilter::IsComplete.matches(&complete));
        assert!(!StatusFilter::IsComplete.matches(&fresh));
        assert!(StatusFilter::InProgress.matches(&in_progress));
        assert!(StatusFilter::NeedsFeedback.matches(&fresh));
        assert!(!StatusFilter::NeedsFeedback.matches(&complete));
    }

    #[tokio::test]
    async fn cached_votes_skips_undecodable_entries() {
        let kv = crate::cache::MemoryKv::new();
        let f = feature(1);
        let v = vote_for(&f, "abc");
        kv.put(&v.cache_key(), &serde_json::to_string(&v).unwrap(), None)
            .await
            .unwrap();
        kv.put("vote:junk", "not-json", None).await.unwrap();

        let votes = cached_votes(&kv).await.unwrap();
        assert_eq!(votes, vec![v]);
    }
}
