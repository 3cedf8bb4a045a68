use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, Row};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::ClusterRecord;
use crate::selector::ClusterSelector;

pub const CLUSTER_TABLE: &str = "clusters";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cluster store unavailable at {}: {reason}", path.display())]
    Unavailable { path: PathBuf, reason: String },

    #[error("cluster store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("cluster snapshot is not a JSON array: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Filters a store may apply on its side. Every hint is optional to honor:
/// the selector re-checks all of them in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterQuery {
    /// Only rows with more feeds than this, or any editorial flag set.
    pub noteworthy_feeds_above: Option<u32>,
    /// Only rows last updated strictly before this instant.
    pub published_before: Option<DateTime<Utc>>,
    /// Only rows last updated at or after this instant.
    pub published_after: Option<DateTime<Utc>>,
}

impl ClusterQuery {
    /// No filtering at all.
    pub fn all() -> Self {
        Self::default()
    }
}

/// Read access to the cluster table. One call is one read; nothing is cached.
pub trait ClusterStore {
    fn fetch(&self, query: &ClusterQuery) -> Result<Vec<ClusterRecord>, StoreError>;
}

/// In-memory store, ignores pushdown hints.
impl ClusterStore for Vec<ClusterRecord> {
    fn fetch(&self, _query: &ClusterQuery) -> Result<Vec<ClusterRecord>, StoreError> {
        Ok(self.clone())
    }
}

/// Read the store once and run the selector over the result.
pub fn load_selected<S: ClusterStore + ?Sized>(
    store: &S,
    selector: &ClusterSelector,
    now: DateTime<Utc>,
) -> Result<Vec<ClusterRecord>, StoreError> {
    let records = store.fetch(&selector.query(now))?;
    let fetched = records.len();
    let selected = selector.select(records, now);

    info!(fetched, selected = selected.len(), "loaded clusters");
    Ok(selected)
}

const SELECT_COLUMNS: &str = "cluster_id, title, num_articles, num_feeds, \
     min_published_date, max_published_date, \
     \"left\", centre_left, centre, centre_right, \"right\", \
     owner_reach, articles, \
     blindspot_left, blindspot_right, single_owner_high_reach, cluster_reach";

/// The `clusters` table in a SQLite database maintained by the upstream
/// pipeline. Opened read-only, once per fetch.
#[derive(Debug, Clone)]
pub struct SqliteClusterStore {
    path: PathBuf,
}

impl SqliteClusterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, StoreError> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Unavailable {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

impl ClusterStore for SqliteClusterStore {
    fn fetch(&self, query: &ClusterQuery) -> Result<Vec<ClusterRecord>, StoreError> {
        let conn = self.open()?;
        let (sql, params) = build_select_sql(query);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), decode_row)?;

        let mut records = Vec::new();
        for row in rows {
            match row? {
                Some(record) => records.push(record),
                None => warn!("skipping cluster row without an integer cluster_id"),
            }
        }

        Ok(records)
    }
}

fn build_select_sql(query: &ClusterQuery) -> (String, Vec<SqlValue>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if let Some(feeds) = query.noteworthy_feeds_above {
        params.push(SqlValue::Integer(i64::from(feeds)));
        clauses.push(format!(
            "(num_feeds > ?{} OR {} OR {} OR {})",
            params.len(),
            flag_is_set_sql("blindspot_left"),
            flag_is_set_sql("blindspot_right"),
            flag_is_set_sql("single_owner_high_reach")
        ));
    }
    if let Some(before) = query.published_before {
        params.push(SqlValue::Text(sql_timestamp(ceil_millis(before))));
        clauses.push(format!(
            "julianday(max_published_date) <= julianday(?{})",
            params.len()
        ));
    }
    if let Some(after) = query.published_after {
        params.push(SqlValue::Text(sql_timestamp(after)));
        clauses.push(format!(
            "julianday(max_published_date) >= julianday(?{})",
            params.len()
        ));
    }

    let mut sql = format!("SELECT {} FROM {}", SELECT_COLUMNS, CLUSTER_TABLE);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY julianday(max_published_date) DESC");

    (sql, params)
}

/// Same truth table as [`flag_column`], so pushdown never drops a row the
/// in-memory check would keep.
fn flag_is_set_sql(column: &str) -> String {
    format!(
        "(CASE typeof({c}) \
         WHEN 'integer' THEN {c} <> 0 \
         WHEN 'real' THEN {c} <> 0 \
         WHEN 'text' THEN trim({c}) IN ('1', 'true', 'TRUE', 'True') \
         ELSE 0 END)",
        c = column
    )
}

/// Truncates to whole milliseconds.
fn sql_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `julianday` rounds stored values to the nearest millisecond, so the upper
/// bound is pushed as the next whole millisecond and compared inclusively.
/// The selector applies the exact strict bound afterwards.
fn ceil_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    let sub_millis = i64::from(at.timestamp_subsec_nanos() % 1_000_000);
    if sub_millis == 0 {
        return at;
    }
    at.checked_add_signed(Duration::nanoseconds(1_000_000 - sub_millis))
        .unwrap_or(at)
}

/// Decode one row. Each column degrades to `None` on its own when it holds
/// something unexpected; only a missing identity drops the row.
fn decode_row(row: &Row<'_>) -> rusqlite::Result<Option<ClusterRecord>> {
    let cluster_id = match row.get_ref(0)? {
        ValueRef::Integer(id) => id,
        _ => return Ok(None),
    };

    Ok(Some(ClusterRecord {
        cluster_id,
        title: text_column(row.get_ref(1)?),
        num_articles: count_column(row.get_ref(2)?),
        num_feeds: count_column(row.get_ref(3)?),
        min_published_date: timestamp_column(row.get_ref(4)?),
        max_published_date: timestamp_column(row.get_ref(5)?),
        left: number_column(row.get_ref(6)?),
        centre_left: number_column(row.get_ref(7)?),
        centre: number_column(row.get_ref(8)?),
        centre_right: number_column(row.get_ref(9)?),
        right: number_column(row.get_ref(10)?),
        owner_reach: text_column(row.get_ref(11)?),
        articles: text_column(row.get_ref(12)?),
        blindspot_left: flag_column(row.get_ref(13)?),
        blindspot_right: flag_column(row.get_ref(14)?),
        single_owner_high_reach: flag_column(row.get_ref(15)?),
        cluster_reach: number_column(row.get_ref(16)?),
    }))
}

fn text_column(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().map(str::to_string),
        _ => None,
    }
}

fn number_column(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Integer(n) => Some(n as f64),
        ValueRef::Real(f) if f.is_finite() => Some(f),
        _ => None,
    }
}

fn count_column(value: ValueRef<'_>) -> Option<u32> {
    match value {
        ValueRef::Integer(n) => u32::try_from(n).ok(),
        ValueRef::Real(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => {
            u32::try_from(f as i64).ok()
        }
        _ => None,
    }
}

fn flag_column(value: ValueRef<'_>) -> Option<bool> {
    match value {
        ValueRef::Integer(n) => Some(n != 0),
        ValueRef::Real(f) => Some(f != 0.0),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes).ok()?.trim() {
            "1" | "true" | "TRUE" | "True" => Some(true),
            "0" | "false" | "FALSE" | "False" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Text timestamps only, RFC 3339 or `YYYY-MM-DD HH:MM:SS[.f]` taken as UTC.
/// Integer columns are left alone since SQLite reads them as Julian days.
fn timestamp_column(value: ValueRef<'_>) -> Option<DateTime<Utc>> {
    let ValueRef::Text(bytes) = value else {
        return None;
    };
    parse_timestamp(std::str::from_utf8(bytes).ok()?)
}

pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// A JSON file holding an array of cluster records.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ClusterStore for JsonSnapshotStore {
    fn fetch(&self, _query: &ClusterQuery) -> Result<Vec<ClusterRecord>, StoreError> {
        let content = fs::read_to_string(&self.path).map_err(|e| StoreError::Unavailable {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let rows: Vec<Value> = serde_json::from_str(&content)?;
        let total = rows.len();

        let records: Vec<ClusterRecord> = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed cluster record in snapshot");
                    None
                }
            })
            .collect();

        if records.len() < total {
            warn!(
                path = %self.path.display(),
                skipped = total - records.len(),
                "snapshot contained malformed records"
            );
        }

        Ok(records)
    }
}
