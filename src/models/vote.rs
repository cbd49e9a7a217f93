use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An endorsement of a feature by one pseudonymous identity.
/// Immutable once recorded; at most one per (identity_hash, feature_uuid)
/// pair, enforced by the vote recorder at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Derived identity digest, never a user-supplied value.
    pub identity_hash: String,
    pub feature_uuid: Uuid,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Vote {
    pub fn new(identity_hash: String, feature_uuid: Uuid, timestamp: i64, comment: Option<String>) -> Self {
        Self {
            identity_hash,
            feature_uuid,
            timestamp,
            comment: comment.filter(|c| !c.is_empty()),
        }
    }

    /// Cache key under which this vote is mirrored. The (identity,
    /// feature) pair key is what makes the dedup check expressible as a
    /// single GET.
    pub fn cache_key(&self) -> String {
        Self::cache_key_for(&self.identity_hash, &self.feature_uuid)
    }

    pub fn cache_key_for(identity_hash: &str, feature_uuid: &Uuid) -> String {
        format!("vote:{}:{}", identity_hash, feature_uuid)
    }

    /// Row for the `Votes!A:D` range:
    /// IdentityHash, FeatureUuid, Timestamp, Comment.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.identity_hash.clone(),
            self.feature_uuid.to_string(),
            self.timestamp.to_string(),
            self.comment.clone().unwrap_or_default(),
        ]
    }
}
