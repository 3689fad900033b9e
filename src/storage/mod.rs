pub mod change_set;
pub mod content_store;
pub mod database;
pub mod graph_store;
pub mod retry;
pub mod run_log;
pub mod tag_store;

pub use change_set::{ChangeSetStore, ChangedContentSet};
pub use content_store::{ContentStore, FeedEntry, RemovedItem};
pub use database::{Database, PoolConfig, SharedDatabase};
pub use graph_store::GraphStore;
pub use retry::{RetryPolicy, with_retry};
pub use run_log::{GenerationLog, LoggedRun};
pub use tag_store::TagStore;
