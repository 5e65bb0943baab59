use std::collections::HashMap;

use super::types::{DockerRuntime, RuntimeClient, RuntimeError, RuntimeEvent, RuntimeResult};
use crate::lib::status::types::RunState;
use async_trait::async_trait;
use bollard::{
    API_DEFAULT_VERSION, Docker,
    container::{InspectContainerOptions, ListContainersOptions},
    secret::{ContainerState, EventMessage},
    system::EventsOptions,
};
use futures_util::stream::{BoxStream, StreamExt};
use tracing::info;

const CONNECT_TIMEOUT_SECS: u64 = 120;

impl From<EventMessage> for RuntimeEvent {
    fn from(message: EventMessage) -> Self {
        let actor = message.actor.unwrap_or_default();
        let from = actor
            .attributes
            .as_ref()
            .and_then(|attributes| attributes.get("image").cloned())
            .unwrap_or_default();

        RuntimeEvent {
            id: actor.id.unwrap_or_default(),
            action: message.action.unwrap_or_default(),
            from,
        }
    }
}

impl From<ContainerState> for RunState {
    fn from(state: ContainerState) -> Self {
        RunState {
            running: state.running.unwrap_or(false),
            paused: state.paused.unwrap_or(false),
            restarting: state.restarting.unwrap_or(false),
            oom_killed: state.oom_killed.unwrap_or(false),
            exit_code: state.exit_code.unwrap_or(0),
            started_at: state.started_at.unwrap_or_default(),
            finished_at: state.finished_at.unwrap_or_default(),
        }
    }
}

impl DockerRuntime {
    pub fn connect(socket: &str) -> RuntimeResult<Self> {
        let client = Docker::connect_with_unix(socket, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)?;
        info!(socket = %socket, "connected to Docker");

        Ok(DockerRuntime { client })
    }
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    async fn list_containers(&self, statuses: &[&str]) -> RuntimeResult<Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert(
            "status".to_string(),
            statuses.iter().map(|status| status.to_string()).collect::<Vec<_>>(),
        );

        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self.client.list_containers(Some(options)).await?;
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    async fn inspect(&self, container_id: &str) -> RuntimeResult<RunState> {
        let response = self
            .client
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await?;

        response
            .state
            .map(RunState::from)
            .ok_or_else(|| RuntimeError::MissingState(container_id.to_string()))
    }

    fn events(&self) -> BoxStream<'_, RuntimeResult<RuntimeEvent>> {
        let mut filters = HashMap::new();
        filters.insert("type".to_string(), vec!["container".to_string()]);

        self.client
            .events(Some(EventsOptions {
                filters,
                ..Default::default()
            }))
            .map(|item| item.map(RuntimeEvent::from).map_err(RuntimeError::from))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::secret::EventActor;

    #[test]
    fn event_message_maps_actor_and_image() {
        let message = EventMessage {
            action: Some("start".to_string()),
            actor: Some(EventActor {
                id: Some("abc123".to_string()),
                attributes: Some(HashMap::from([
                    ("image".to_string(), "nginx:1.27".to_string()),
                    ("name".to_string(), "ecs-web-1-app".to_string()),
                ])),
            }),
            ..Default::default()
        };

        let event = RuntimeEvent::from(message);

        assert_eq!(event.id, "abc123");
        assert_eq!(event.action, "start");
        assert_eq!(event.from, "nginx:1.27");
    }

    #[test]
    fn event_without_actor_is_empty() {
        let event = RuntimeEvent::from(EventMessage::default());

        assert_eq!(event, RuntimeEvent::default());
    }

    #[test]
    fn container_state_defaults_missing_flags() {
        let state = ContainerState {
            exit_code: Some(137),
            oom_killed: Some(true),
            started_at: Some("2024-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };

        let run_state = RunState::from(state);

        assert_eq!(run_state.exit_code, 137);
        assert!(run_state.oom_killed);
        assert!(!run_state.running && !run_state.paused && !run_state.restarting);
        assert_eq!(run_state.finished_at, "");
    }
}
