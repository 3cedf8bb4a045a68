use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use shared::{
    load_selected, ClusterRecord, ClusterSelector, ClusterStore, Config, Overrides,
    SqliteClusterStore,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "serve-clusters",
    about = "HTTP API returning the selected news clusters as JSON"
)]
struct Args {
    /// Address to bind the HTTP server to (overrides CLUSTER_DESK_BIND)
    #[arg(long)]
    bind: Option<String>,

    /// SQLite database holding the clusters table (overrides CLUSTER_STORE_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Hours a cluster must be quiet before it is served (overrides PUBLISH_DELAY_HOURS)
    #[arg(long)]
    delay_hours: Option<f64>,

    /// Only serve clusters updated within this many days
    #[arg(long)]
    max_age_days: Option<i64>,

    /// Maximum number of clusters per response
    #[arg(long)]
    limit: Option<usize>,
}

type SharedStore = Arc<dyn ClusterStore + Send + Sync>;

#[derive(Clone)]
struct AppState {
    store: SharedStore,
    selector: ClusterSelector,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("serve_clusters=info".parse()?)
                .add_directive("shared=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env(Overrides {
        store_path: args.db,
        publish_delay_hours: args.delay_hours,
        bind_addr: args.bind,
    })?;

    let delay_hours = config.publish_delay_hours;
    let mut selector = config.selector();
    if let Some(days) = args.max_age_days {
        selector = selector.with_max_age(shared::config::max_age_from_days(days)?);
    }
    if let Some(limit) = args.limit {
        selector = selector.with_limit(limit);
    }

    let store_path = config.store_path()?.to_path_buf();
    let state = AppState {
        store: Arc::new(SqliteClusterStore::new(&store_path)),
        selector,
    };

    let bind = &config.bind_addr;
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {}", bind))?;

    info!(%addr, store = %store_path.display(), delay_hours, "serve-clusters listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router(state))
        .await
        .context("server shutdown")?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/clusters", get(clusters_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// The selected clusters, newest first. Any failure is a bare 500; no
/// partial list is ever returned.
async fn clusters_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClusterRecord>>, (StatusCode, Json<ErrorBody>)> {
    let store = Arc::clone(&state.store);
    let selector = state.selector.clone();

    let loaded =
        tokio::task::spawn_blocking(move || load_selected(store.as_ref(), &selector, Utc::now()))
            .await;

    match loaded {
        Ok(Ok(clusters)) => Ok(Json(clusters)),
        Ok(Err(err)) => {
            error!(error = %err, "failed to load clusters");
            Err(internal_error())
        }
        Err(err) => {
            error!(error = %err, "cluster loading task failed");
            Err(internal_error())
        }
    }
}

fn internal_error() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            message: "internal error".to_string(),
        }),
    )
}
