use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::lib::{
    notify::types::{Publisher, StatusNotification},
    runtime::types::{RuntimeClient, RuntimeError, RuntimeResult},
    tasks::{
        resolver::TaskResolver,
        types::{CorrelationCache, ResolveError},
    },
};

/// Turns runtime events into status notifications.
///
/// Owns the correlation cache for the lifetime of the process; only the
/// event loop driving this value inserts or evicts entries.
pub struct Correlator<S> {
    pub resolver: TaskResolver<S>,
    pub cache: CorrelationCache,
    pub cluster_name: String,
}

/// What a single event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Record without id or action.
    Malformed,
    /// Destroy event; `tracked` tells whether a cache entry was removed.
    Evicted { tracked: bool },
    Notify(StatusNotification),
}

#[derive(Debug, Error)]
pub enum CorrelateError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("task {task_arn} lists no containers")]
    NoContainers { task_arn: String },

    /// The event feed itself failed; the subscription has to be rebuilt.
    #[error("event stream failed: {0}")]
    StreamFatal(#[source] RuntimeError),
}

pub type CorrelateResult<T> = Result<T, CorrelateError>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("cannot connect to runtime: {0}")]
    Connect(#[from] RuntimeError),
}

pub type WatchResult<T> = Result<T, WatchError>;

/// Builds the per-subscription collaborators. Called again on every reconnect.
#[async_trait]
pub trait Connector: Send + Sync {
    type Runtime: RuntimeClient + 'static;

    async fn runtime(&self) -> RuntimeResult<Self::Runtime>;

    async fn publisher(&self) -> Arc<dyn Publisher>;
}

/// Docker socket plus SNS topic, or the log when `dry_run` is set.
#[derive(Debug, Clone)]
pub struct DockerConnector {
    pub socket: String,
    pub region: String,
    pub topic_arn: String,
    pub dry_run: bool,
}
