use async_trait::async_trait;
use bollard::Docker;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::lib::status::types::RunState;

/// One container lifecycle record from the runtime's event feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub id: String,
    pub action: String,
    /// Image the container was created from.
    pub from: String,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),

    #[error("container {0} reported no state")]
    MissingState(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// The slice of the container runtime the watcher depends on.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Ids of all containers whose status is one of `statuses`.
    async fn list_containers(&self, statuses: &[&str]) -> RuntimeResult<Vec<String>>;

    async fn inspect(&self, container_id: &str) -> RuntimeResult<RunState>;

    /// Live container events. The stream ends when the runtime closes the feed.
    fn events(&self) -> BoxStream<'_, RuntimeResult<RuntimeEvent>>;
}

#[derive(Debug, Clone)]
pub struct DockerRuntime {
    pub client: Docker,
}
