//! Picks the clusters worth showing: noteworthy, settled for at least the
//! publish delay, newest first, one row per `cluster_id`.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::debug;

use crate::models::ClusterRecord;
use crate::store::ClusterQuery;

/// A cluster covered by more feeds than this is noteworthy on breadth alone.
pub const NOTEWORTHY_FEEDS_ABOVE: u32 = 8;

pub const DEFAULT_PUBLISH_DELAY_HOURS: f64 = 2.0;

/// Broad coverage, or any of the editorial anomaly flags.
pub fn is_noteworthy(record: &ClusterRecord) -> bool {
    record.num_feeds.is_some_and(|n| n > NOTEWORTHY_FEEDS_ABOVE)
        || record.is_blindspot_left()
        || record.is_blindspot_right()
        || record.is_single_owner_high_reach()
}

/// Records sorted by `max_published_date`, newest first.
///
/// Deduplication is only offered on this type, so the surviving row of a
/// duplicated `cluster_id` is always the most recently updated one.
#[derive(Debug, Clone)]
pub struct RecencyOrdered(Vec<ClusterRecord>);

impl RecencyOrdered {
    /// Undated records sort after every dated one.
    pub fn sort(mut records: Vec<ClusterRecord>) -> Self {
        // Option orders None first, so reversing puts it last
        records.sort_by(|a, b| b.max_published_date.cmp(&a.max_published_date));
        Self(records)
    }

    /// Keep the first (newest) row of each `cluster_id`.
    pub fn dedupe(self) -> Vec<ClusterRecord> {
        let mut seen = HashSet::new();
        self.0
            .into_iter()
            .filter(|record| seen.insert(record.cluster_id))
            .collect()
    }

    pub fn as_slice(&self) -> &[ClusterRecord] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSelector {
    publish_delay: Duration,
    max_age: Option<Duration>,
    limit: Option<usize>,
}

impl Default for ClusterSelector {
    fn default() -> Self {
        Self::from_hours(DEFAULT_PUBLISH_DELAY_HOURS)
    }
}

impl ClusterSelector {
    pub fn new(publish_delay: Duration) -> Self {
        Self {
            publish_delay,
            max_age: None,
            limit: None,
        }
    }

    /// Fractional hours are rounded to the nearest second. Negative and NaN
    /// hours mean no delay; delays too long for a `Duration` saturate, which
    /// leaves nothing stable.
    pub fn from_hours(hours: f64) -> Self {
        Self::new(hours_to_duration(hours))
    }

    /// Also drop clusters whose last update is older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Keep at most `limit` clusters after deduplication.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn publish_delay(&self) -> Duration {
        self.publish_delay
    }

    /// Clusters updated at or after this instant are still settling.
    /// `None` when the delay reaches past the start of time.
    pub fn stable_before(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(self.publish_delay)
    }

    fn oldest_allowed(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age.and_then(|age| now.checked_sub_signed(age))
    }

    /// Filters a store can apply before handing records over.
    pub fn query(&self, now: DateTime<Utc>) -> ClusterQuery {
        ClusterQuery {
            noteworthy_feeds_above: Some(NOTEWORTHY_FEEDS_ABOVE),
            published_before: self.stable_before(now),
            published_after: self.oldest_allowed(now),
        }
    }

    /// Whether a record has settled. Undated records never have.
    pub fn is_stable(&self, record: &ClusterRecord, now: DateTime<Utc>) -> bool {
        match (record.max_published_date, self.stable_before(now)) {
            (Some(published), Some(cutoff)) => published < cutoff,
            _ => false,
        }
    }

    fn is_recent_enough(&self, record: &ClusterRecord, now: DateTime<Utc>) -> bool {
        match (record.max_published_date, self.oldest_allowed(now)) {
            (_, None) => true,
            (Some(published), Some(oldest)) => published >= oldest,
            (None, Some(_)) => false,
        }
    }

    pub fn is_eligible(&self, record: &ClusterRecord, now: DateTime<Utc>) -> bool {
        is_noteworthy(record) && self.is_stable(record, now) && self.is_recent_enough(record, now)
    }

    pub fn select(
        &self,
        records: impl IntoIterator<Item = ClusterRecord>,
        now: DateTime<Utc>,
    ) -> Vec<ClusterRecord> {
        let eligible: Vec<ClusterRecord> = records
            .into_iter()
            .filter(|record| self.is_eligible(record, now))
            .collect();
        let eligible_count = eligible.len();

        let mut selected = RecencyOrdered::sort(eligible).dedupe();
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }

        debug!(
            eligible = eligible_count,
            selected = selected.len(),
            "selected clusters"
        );
        selected
    }
}

fn hours_to_duration(hours: f64) -> Duration {
    // `as` saturates, and NaN becomes zero
    let seconds = (hours.max(0.0) * 3600.0).round() as i64;
    Duration::try_seconds(seconds).unwrap_or(Duration::MAX)
}
