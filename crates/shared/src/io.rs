use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::APP_DIR;
use crate::models::ClusterRecord;

/// Get the default directory for rendered timeline pages
pub fn get_default_output_dir() -> Result<PathBuf> {
    let output_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join(APP_DIR)
        .join("timeline");

    fs::create_dir_all(&output_dir).context("Failed to create timeline directory")?;

    Ok(output_dir)
}

pub fn timeline_filename(date: DateTime<Utc>) -> String {
    format!("timeline-{}.html", date.format("%Y-%m-%d"))
}

/// Write the timeline page to `target`, or to the default output directory
/// when no target is given.
pub fn save_timeline(html: &str, target: Option<&Path>, date: DateTime<Utc>) -> Result<PathBuf> {
    let filepath = match target {
        Some(path) => path.to_path_buf(),
        None => get_default_output_dir()?.join(timeline_filename(date)),
    };

    fs::write(&filepath, html)
        .with_context(|| format!("Failed to write timeline page: {}", filepath.display()))?;

    Ok(filepath)
}

/// Save the selected clusters as a JSON array
pub fn save_clusters_json(clusters: &[ClusterRecord], path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(clusters).context("Failed to serialize cluster list")?;

    fs::write(path, json)
        .with_context(|| format!("Failed to write cluster list: {}", path.display()))?;

    Ok(())
}
