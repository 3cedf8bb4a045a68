//! Turns a cluster's leaning weights and owner reach into proportional bar
//! segments.
//!
//! Widths are always computed over every non-zero entry. The display
//! thresholds below only decide which segments are emitted and whether they
//! carry a label.

use serde::Serialize;

use crate::encoded::OwnerReach;
use crate::models::ClusterRecord;

/// Segments narrower than this are not drawn.
pub const MIN_VISIBLE_PERCENT: f64 = 5.0;
/// Segments at least this wide get a text label.
pub const MIN_LABELED_PERCENT: f64 = 10.0;

/// Shared by every owner without an entry in [`KNOWN_OWNER_COLORS`].
pub const FALLBACK_OWNER_COLOR: &str = "#9CA3AF";

const KNOWN_OWNER_COLORS: &[(&str, &str)] = &[
    ("DPG Media", "#D7263D"),
    ("Mediahuis", "#1B4F9C"),
    ("NPO", "#F46036"),
    ("RTL Nederland", "#2E294E"),
    ("Talpa Network", "#7B2CBF"),
    ("NDC Mediagroep", "#1B998B"),
    ("BNR", "#E0A100"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaningBucket {
    Left,
    CentreLeft,
    Centre,
    CentreRight,
    Right,
}

impl LeaningBucket {
    /// Left to right, the order the bar is drawn in.
    pub const ALL: [LeaningBucket; 5] = [
        LeaningBucket::Left,
        LeaningBucket::CentreLeft,
        LeaningBucket::Centre,
        LeaningBucket::CentreRight,
        LeaningBucket::Right,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LeaningBucket::Left => "Left",
            LeaningBucket::CentreLeft => "Centre-left",
            LeaningBucket::Centre => "Centre",
            LeaningBucket::CentreRight => "Centre-right",
            LeaningBucket::Right => "Right",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            LeaningBucket::Left => "#2563EB",
            LeaningBucket::CentreLeft => "#4B82D4",
            LeaningBucket::Centre => "#6B7280",
            LeaningBucket::CentreRight => "#B55A3A",
            LeaningBucket::Right => "#DC2626",
        }
    }

    pub fn weight(self, record: &ClusterRecord) -> Option<f64> {
        match self {
            LeaningBucket::Left => record.left,
            LeaningBucket::CentreLeft => record.centre_left,
            LeaningBucket::Centre => record.centre,
            LeaningBucket::CentreRight => record.centre_right,
            LeaningBucket::Right => record.right,
        }
    }
}

pub fn owner_color(owner: &str) -> &'static str {
    KNOWN_OWNER_COLORS
        .iter()
        .find(|(name, _)| *name == owner)
        .map(|(_, color)| *color)
        .unwrap_or(FALLBACK_OWNER_COLOR)
}

/// A drawable piece of a bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub label: String,
    pub width_percent: f64,
    pub color: &'static str,
    /// False for blocks too narrow to hold text.
    pub labeled: bool,
}

impl Segment {
    /// Text drawn inside the segment, e.g. `"Left 50%"`.
    pub fn caption(&self) -> Option<String> {
        self.labeled
            .then(|| format!("{} {}%", self.label, self.width_percent.round() as i64))
    }
}

fn visible_segment(label: &str, width_percent: f64, color: &'static str) -> Option<Segment> {
    if width_percent < MIN_VISIBLE_PERCENT {
        return None;
    }

    Some(Segment {
        label: label.to_string(),
        width_percent,
        color,
        labeled: width_percent >= MIN_LABELED_PERCENT,
    })
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Leaning shares in percent, normalized over the non-zero buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaningDistribution {
    shares: Vec<(LeaningBucket, f64)>,
}

impl LeaningDistribution {
    pub fn from_record(record: &ClusterRecord) -> Self {
        let weights: Vec<(LeaningBucket, f64)> = LeaningBucket::ALL
            .iter()
            .filter_map(|&bucket| {
                bucket
                    .weight(record)
                    .filter(|w| is_positive(*w))
                    .map(|w| (bucket, w))
            })
            .collect();

        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if !is_positive(total) {
            return Self::default();
        }

        let shares = weights
            .into_iter()
            .map(|(bucket, w)| (bucket, 100.0 * w / total))
            .collect();

        Self { shares }
    }

    pub fn shares(&self) -> &[(LeaningBucket, f64)] {
        &self.shares
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.shares
            .iter()
            .filter_map(|&(bucket, pct)| visible_segment(bucket.label(), pct, bucket.color()))
            .collect()
    }
}

/// Owner shares in percent, largest first. Unlike the leaning shares these
/// are not renormalized: a fraction of 0.4 is 40%.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnershipDistribution {
    shares: Vec<(String, f64)>,
}

impl OwnershipDistribution {
    pub fn from_owner_reach(reach: &OwnerReach) -> Self {
        let mut shares: Vec<(String, f64)> = reach
            .entries()
            .iter()
            .map(|(owner, fraction)| (owner.clone(), fraction * 100.0))
            .filter(|(_, pct)| is_positive(*pct))
            .collect();

        // Stable, so equal shares keep the decoder's order
        shares.sort_by(|a, b| b.1.total_cmp(&a.1));

        Self { shares }
    }

    pub fn from_record(record: &ClusterRecord) -> Self {
        Self::from_owner_reach(&record.parsed_owner_reach())
    }

    pub fn shares(&self) -> &[(String, f64)] {
        &self.shares
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.shares
            .iter()
            .filter_map(|(owner, pct)| visible_segment(owner, *pct, owner_color(owner)))
            .collect()
    }
}

pub fn leaning_distribution(record: &ClusterRecord) -> LeaningDistribution {
    LeaningDistribution::from_record(record)
}

pub fn ownership_distribution(record: &ClusterRecord) -> OwnershipDistribution {
    OwnershipDistribution::from_record(record)
}

pub fn compose_leaning_bar(record: &ClusterRecord) -> Vec<Segment> {
    leaning_distribution(record).segments()
}

pub fn compose_ownership_bar(record: &ClusterRecord) -> Vec<Segment> {
    ownership_distribution(record).segments()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaning(weights: [Option<f64>; 5]) -> ClusterRecord {
        let [left, centre_left, centre, centre_right, right] = weights;
        ClusterRecord {
            left,
            centre_left,
            centre,
            centre_right,
            right,
            ..ClusterRecord::new(1)
        }
    }

    fn with_owner_reach(text: &str) -> ClusterRecord {
        ClusterRecord {
            owner_reach: Some(text.to_string()),
            ..ClusterRecord::new(1)
        }
    }

    #[test]
    fn test_even_split_is_labeled() {
        let record = leaning([Some(1.0), None, None, None, Some(1.0)]);
        let bar = compose_leaning_bar(&record);

        assert_eq!(bar.len(), 2);
        assert_eq!(bar[0].label, "Left");
        assert_eq!(bar[1].label, "Right");
        assert!(bar.iter().all(|s| s.labeled));
        assert!(bar.iter().all(|s| (s.width_percent - 50.0).abs() < 1e-9));
        let total: f64 = bar.iter().map(|s| s.width_percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert_eq!(bar[0].caption().as_deref(), Some("Left 50%"));
    }

    #[test]
    fn test_slivers_are_dropped() {
        let record = leaning([Some(97.0), None, Some(2.0), None, Some(1.0)]);
        let bar = compose_leaning_bar(&record);

        assert_eq!(bar.len(), 1);
        assert_eq!(bar[0].label, "Left");
        assert!(bar[0].labeled);
        assert!((bar[0].width_percent - 97.0).abs() < 1e-9);
        assert_eq!(bar[0].caption().as_deref(), Some("Left 97%"));

        // The hidden buckets still count towards the proportions
        let shares = leaning_distribution(&record);
        assert_eq!(shares.shares().len(), 3);
        let total: f64 = shares.shares().iter().map(|(_, p)| p).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_narrow_segment_has_no_label() {
        // 7 / 100 = 7%
        let record = leaning([Some(7.0), Some(93.0), None, None, None]);
        let bar = compose_leaning_bar(&record);

        assert_eq!(bar.len(), 2);
        assert_eq!(bar[0].label, "Left");
        assert!(!bar[0].labeled);
        assert_eq!(bar[0].caption(), None);
        assert!(bar[1].labeled);
    }

    #[test]
    fn test_threshold_boundaries() {
        let record = leaning([Some(5.0), Some(10.0), Some(85.0), None, None]);
        let bar = compose_leaning_bar(&record);

        assert_eq!(bar.len(), 3);
        assert!(!bar[0].labeled);
        assert!(bar[1].labeled);
    }

    #[test]
    fn test_empty_leaning_has_no_segments() {
        assert!(compose_leaning_bar(&leaning([None; 5])).is_empty());
        assert!(compose_leaning_bar(&leaning([Some(0.0); 5])).is_empty());
        assert!(leaning_distribution(&leaning([None; 5])).is_empty());
    }

    #[test]
    fn test_leaning_order_and_colors_are_fixed() {
        let record = leaning([Some(1.0), Some(1.0), Some(1.0), Some(1.0), Some(1.0)]);
        let bar = compose_leaning_bar(&record);

        let labels: Vec<_> = bar.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Left", "Centre-left", "Centre", "Centre-right", "Right"]
        );
        for (segment, bucket) in bar.iter().zip(LeaningBucket::ALL) {
            assert_eq!(segment.color, bucket.color());
        }
    }

    #[test]
    fn test_negative_weights_are_ignored() {
        let record = leaning([Some(-3.0), None, Some(1.0), None, None]);
        let bar = compose_leaning_bar(&record);

        assert_eq!(bar.len(), 1);
        assert!((bar[0].width_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_ownership_sorted_largest_first() {
        let record = with_owner_reach(r#"{"Mediahuis": 0.2, "DPG Media": 0.7, "NPO": 0.08}"#);
        let bar = compose_ownership_bar(&record);

        let labels: Vec<_> = bar.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["DPG Media", "Mediahuis", "NPO"]);
        assert!((bar[0].width_percent - 70.0).abs() < 1e-9);
        assert!(bar[1].labeled);
        assert!(!bar[2].labeled);
    }

    #[test]
    fn test_ownership_drops_non_positive_and_slivers() {
        let record =
            with_owner_reach(r#"{"DPG Media": 0.9, "NPO": 0.0, "BNR": -0.1, "Mediahuis": 0.03}"#);
        let bar = compose_ownership_bar(&record);

        assert_eq!(bar.len(), 1);
        assert_eq!(bar[0].label, "DPG Media");
        assert_eq!(ownership_distribution(&record).shares().len(), 2);
    }

    #[test]
    fn test_ownership_ties_are_deterministic() {
        let record = with_owner_reach(r#"{"Zeta Media": 0.5, "Alpha Media": 0.5}"#);

        let first = compose_ownership_bar(&record);
        let second = compose_ownership_bar(&record);
        assert_eq!(first, second);
        assert_eq!(first[0].label, "Alpha Media");
    }

    #[test]
    fn test_unknown_owners_share_fallback_color() {
        let record = with_owner_reach(r#"{"Local Gazette": 0.5, "Regio Krant": 0.3, "NPO": 0.2}"#);
        let bar = compose_ownership_bar(&record);

        assert_eq!(bar[0].color, FALLBACK_OWNER_COLOR);
        assert_eq!(bar[1].color, FALLBACK_OWNER_COLOR);
        assert_eq!(bar[2].color, owner_color("NPO"));
        assert_ne!(owner_color("NPO"), FALLBACK_OWNER_COLOR);
    }

    #[test]
    fn test_malformed_owner_reach_has_no_segments() {
        assert!(compose_ownership_bar(&with_owner_reach("DPG Media=0.5")).is_empty());
        assert!(compose_ownership_bar(&with_owner_reach("[1, 2]")).is_empty());
        assert!(compose_ownership_bar(&ClusterRecord::new(1)).is_empty());
    }
}
