use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;
use thiserror::Error;

/// One container entry of a task as reported by the ECS agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerDescriptor {
    #[serde(alias = "dockerId")]
    pub docker_id: String,
    #[serde(alias = "dockerName")]
    pub docker_name: String,
    #[serde(alias = "name")]
    pub name: String,
}

/// Binding between a container and the task that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskAssociation {
    #[serde(alias = "arn")]
    pub arn: String,
    #[serde(alias = "desiredStatus")]
    pub desired_status: String,
    #[serde(alias = "knownStatus")]
    pub known_status: String,
    #[serde(alias = "family")]
    pub family: String,
    #[serde(alias = "containers")]
    pub containers: Vec<ContainerDescriptor>,
}

/// Container id -> resolved task. Only the correlator mutates it.
#[derive(Debug, Default)]
pub struct CorrelationCache {
    pub entries: HashMap<String, Arc<TaskAssociation>>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The agent answered but knows no task for this container.
    #[error("no task association for container {container_id}")]
    NotFound { container_id: String },

    #[error("metadata service request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ResolveError {
    pub fn not_found(container_id: impl Into<String>) -> Self {
        Self::NotFound {
            container_id: container_id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
