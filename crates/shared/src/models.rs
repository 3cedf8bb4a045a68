use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::encoded::{ArticleList, OwnerReach};

/// One row of the externally maintained cluster table.
///
/// The same `cluster_id` can appear on several rows when the upstream
/// pipeline re-materializes a snapshot; see [`crate::selector`] for how
/// duplicates are resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub cluster_id: i64,
    pub title: Option<String>,
    pub num_articles: Option<u32>,
    pub num_feeds: Option<u32>,
    pub min_published_date: Option<DateTime<Utc>>,
    pub max_published_date: Option<DateTime<Utc>>,

    // Unnormalized leaning weights, one per bucket
    pub left: Option<f64>,
    pub centre_left: Option<f64>,
    pub centre: Option<f64>,
    pub centre_right: Option<f64>,
    pub right: Option<f64>,

    /// Encoded JSON object of owner name to reach fraction
    pub owner_reach: Option<String>,
    /// Encoded JSON array of `{title, feed, url}` objects
    pub articles: Option<String>,

    pub blindspot_left: Option<bool>,
    pub blindspot_right: Option<bool>,
    pub single_owner_high_reach: Option<bool>,

    pub cluster_reach: Option<f64>,
}

impl ClusterRecord {
    pub fn new(cluster_id: i64) -> Self {
        Self {
            cluster_id,
            ..Self::default()
        }
    }

    pub fn is_blindspot_left(&self) -> bool {
        self.blindspot_left == Some(true)
    }

    pub fn is_blindspot_right(&self) -> bool {
        self.blindspot_right == Some(true)
    }

    pub fn is_single_owner_high_reach(&self) -> bool {
        self.single_owner_high_reach == Some(true)
    }

    /// Parsed owner reach; malformed text yields an empty distribution.
    pub fn parsed_owner_reach(&self) -> OwnerReach {
        OwnerReach::from_field(self.owner_reach.as_deref())
    }

    /// Parsed article list; malformed text yields an empty list.
    pub fn parsed_articles(&self) -> ArticleList {
        ArticleList::from_field(self.articles.as_deref())
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled story")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deserialize_with_missing_optionals() {
        let record: ClusterRecord = serde_json::from_str(r#"{"cluster_id": 7}"#).unwrap();

        assert_eq!(record, ClusterRecord::new(7));
        assert!(!record.is_blindspot_left());
        assert!(record.parsed_owner_reach().is_empty());
        assert!(record.parsed_articles().is_empty());
    }

    #[test]
    fn test_deserialize_full_row() {
        let json = r#"{
            "cluster_id": 42,
            "title": "Kabinet valt",
            "num_articles": 14,
            "num_feeds": 9,
            "max_published_date": "2026-02-01T12:00:00Z",
            "left": 3.0,
            "centre": 5,
            "owner_reach": "{\"DPG Media\": 0.6}",
            "blindspot_right": true,
            "single_owner_high_reach": null
        }"#;
        let record: ClusterRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.cluster_id, 42);
        assert_eq!(record.num_feeds, Some(9));
        assert_eq!(
            record.max_published_date,
            Some(Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(record.centre, Some(5.0));
        assert!(record.is_blindspot_right());
        assert_eq!(record.single_owner_high_reach, None);
        assert_eq!(record.parsed_owner_reach().entries().len(), 1);
    }

    #[test]
    fn test_serialize_keeps_encoded_fields_as_text() {
        let mut record = ClusterRecord::new(1);
        record.owner_reach = Some("not json".to_string());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["owner_reach"], "not json");
        assert_eq!(value["cluster_id"], 1);
    }

    #[test]
    fn test_display_title_fallback() {
        assert_eq!(ClusterRecord::new(1).display_title(), "Untitled story");
    }
}
