use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use shared::{
    compose_leaning_bar, compose_ownership_bar, load_selected, save_clusters_json, save_timeline,
    ClusterRecord, ClusterStore, Config, JsonSnapshotStore, Overrides, Segment,
    SqliteClusterStore, TimelinePage,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "select_clusters=info,shared=info";

#[derive(Parser)]
#[command(name = "select-clusters")]
#[command(about = "Select noteworthy, settled news clusters and render the timeline page")]
struct Args {
    /// SQLite database holding the clusters table (overrides CLUSTER_STORE_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Read clusters from a JSON snapshot instead of the database
    #[arg(long, conflicts_with = "db")]
    snapshot: Option<PathBuf>,

    /// Hours a cluster must be quiet before it is shown (overrides PUBLISH_DELAY_HOURS)
    #[arg(long)]
    delay_hours: Option<f64>,

    /// Only show clusters updated within this many days
    #[arg(long)]
    max_age_days: Option<i64>,

    /// Maximum number of clusters to keep
    #[arg(short, long)]
    limit: Option<usize>,

    /// Where to write the timeline page (defaults to the local data directory)
    #[arg(long)]
    html: Option<PathBuf>,

    /// Also write the selected clusters as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Skip writing the timeline page
    #[arg(long)]
    no_html: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env(Overrides {
        store_path: args.db,
        publish_delay_hours: args.delay_hours,
        bind_addr: None,
    })?;

    let delay_hours = config.publish_delay_hours;
    let mut selector = config.selector();
    if let Some(days) = args.max_age_days {
        selector = selector.with_max_age(shared::config::max_age_from_days(days)?);
    }
    if let Some(limit) = args.limit {
        selector = selector.with_limit(limit);
    }

    let store: Box<dyn ClusterStore> = match &args.snapshot {
        Some(snapshot) => {
            println!("📚 Reading clusters from snapshot {}", snapshot.display());
            Box::new(JsonSnapshotStore::new(snapshot))
        }
        None => {
            let path = config.store_path()?;
            println!("📚 Reading clusters from {}", path.display());
            Box::new(SqliteClusterStore::new(path))
        }
    };

    let now = Utc::now();
    let clusters =
        load_selected(store.as_ref(), &selector, now).context("Failed to load clusters")?;

    if clusters.is_empty() {
        println!(
            "No clusters are both noteworthy and older than {} hours.",
            delay_hours
        );
    } else {
        println!("✓ Selected {} clusters\n", clusters.len());
        for cluster in &clusters {
            print_cluster(cluster);
        }
    }

    if let Some(path) = &args.json {
        save_clusters_json(&clusters, path)?;
        println!("\n✓ Cluster list saved to: {}", path.display());
    }

    if !args.no_html {
        println!("\n📝 Generating timeline page...");
        let html = TimelinePage::generate(&clusters, now);
        let filepath = save_timeline(&html, args.html.as_deref(), now)
            .context("Failed to save timeline page")?;
        println!("\n✅ Timeline saved to: {}", filepath.display());
    }

    Ok(())
}

fn print_cluster(cluster: &ClusterRecord) {
    let updated = cluster
        .max_published_date
        .map(|d| d.format("%d-%m-%Y %H:%M").to_string())
        .unwrap_or_default();

    let mut tags = Vec::new();
    if cluster.is_blindspot_left() {
        tags.push("blindspot left");
    }
    if cluster.is_blindspot_right() {
        tags.push("blindspot right");
    }
    if cluster.is_single_owner_high_reach() {
        tags.push("single owner");
    }
    let tags = if tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", tags.join(", "))
    };

    println!("  • {}{}", cluster.display_title(), tags);
    println!(
        "    {} · {} sources · {} articles",
        updated,
        cluster.num_feeds.unwrap_or(0),
        cluster.num_articles.unwrap_or(0)
    );
    println!("    leaning:   {}", bar_summary(&compose_leaning_bar(cluster)));
    println!("    ownership: {}", bar_summary(&compose_ownership_bar(cluster)));
}

fn bar_summary(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "no data".to_string();
    }

    segments
        .iter()
        .map(|s| {
            s.caption()
                .unwrap_or_else(|| format!("{} (narrow)", s.label))
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
