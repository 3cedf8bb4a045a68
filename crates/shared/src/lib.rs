// Public modules
pub mod bias;
pub mod config;
pub mod encoded;
pub mod io;
pub mod models;
pub mod selector;
pub mod store;
pub mod timeline;

// Re-export commonly used types
pub use bias::{
    compose_leaning_bar, compose_ownership_bar, LeaningBucket, LeaningDistribution,
    OwnershipDistribution, Segment,
};
pub use config::{Config, Overrides};
pub use encoded::{Article, ArticleList, OwnerReach};
pub use io::{get_default_output_dir, save_clusters_json, save_timeline};
pub use models::ClusterRecord;
pub use selector::{is_noteworthy, ClusterSelector, RecencyOrdered};
pub use store::{
    load_selected, ClusterQuery, ClusterStore, JsonSnapshotStore, SqliteClusterStore, StoreError,
};
pub use timeline::TimelinePage;
