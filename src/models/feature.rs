use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A roadmap entry. Status flags are flipped later by an external curator
/// process; this service only ever creates features in the
/// feedback-gathering state and never deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub uuid: Uuid,
    pub title: String,
    pub description: String,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    pub is_complete: bool,
    pub needs_feedback: bool,
    pub in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_release: Option<String>,
}

impl Feature {
    /// New submissions always start as needs-feedback.
    pub fn new(title: String, description: String, timestamp: i64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title,
            description,
            timestamp,
            is_complete: false,
            needs_feedback: true,
            in_progress: false,
            target_release: None,
        }
    }

    /// Row for the `Features!A:H` range:
    /// UUID, Title, Description, Timestamp, IsComplete, NeedsFeedback,
    /// InProgress, TargetRelease.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.uuid.to_string(),
            self.title.clone(),
            self.description.clone(),
            self.timestamp.to_string(),
            sheet_bool(self.is_complete),
            sheet_bool(self.needs_feedback),
            sheet_bool(self.in_progress),
            self.target_release.clone().unwrap_or_default(),
        ]
    }

    /// Parse a sheet row back into a feature. Rows with an unparseable
    /// uuid are skipped by the caller; other malformed cells fall back to
    /// defaults the way the export has always been read.
    pub fn from_row(row: &[String]) -> Option<Self> {
        let uuid = Uuid::parse_str(row.first()?.trim()).ok()?;
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        Some(Self {
            uuid,
            title: cell(1),
            description: cell(2),
            timestamp: cell(3).trim().parse().unwrap_or(0),
            is_complete: cell(4) == "TRUE",
            needs_feedback: cell(5) == "TRUE",
            in_progress: cell(6) == "TRUE",
            target_release: Some(cell(7)).filter(|s| !s.is_empty()),
        })
    }
}

fn sheet_bool(b: bool) -> String {
    if b { "TRUE" } else { "FALSE" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_feature_starts_in_feedback_state() {
        let f = Feature::new("Dark mode".into(), "Please".into(), 1_700_000_000_000);
        assert!(f.needs_feedback);
        assert!(!f.is_complete);
        assert!(!f.in_progress);
        assert!(f.target_release.is_none());
    }

    #[test]
    fn new_features_get_fresh_uuids() {
        let a = Feature::new("T".into(), "D".into(), 0);
        let b = Feature::new("T".into(), "D".into(), 0);
        assert_ne!(a.uuid, b.uuid);
    }

    #[test]
    fn row_roundtrip_preserves_fields() {
        let mut f = Feature::new("Title".into(), "Desc, with comma".into(), 1234);
        f.target_release = Some("v2.0".into());
        let parsed = Feature::from_row(&f.to_row()).unwrap();
        assert_eq!(parsed, f);
    }

    #[test]
    fn from_row_defaults_malformed_cells() {
        let row: Vec<String> = vec![
            Uuid::new_v4().to_string(),
            "T".into(),
            "D".into(),
            "not-a-number".into(),
            "TRUE".into(),
        ];
        let f = Feature::from_row(&row).unwrap();
        assert_eq!(f.timestamp, 0);
        assert!(f.is_complete);
        assert!(!f.needs_feedback);
        assert!(f.target_release.is_none());
    }

    #[test]
    fn from_row_rejects_bad_uuid() {
        let row = vec!["not-a-uuid".to_string(), "T".into()];
        assert!(Feature::from_row(&row).is_none());
    }

    #[test]
    fn json_uses_camel_case() {
        let f = Feature::new("T".into(), "D".into(), 7);
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["needsFeedback"], true);
        assert_eq!(v["isComplete"], false);
        assert_eq!(v["inProgress"], false);
        assert!(v.get("target_release").is_none());
    }
}
