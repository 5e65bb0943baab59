use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::debug;

use super::types::{
    ContainerDescriptor, CorrelationCache, ResolveError, ResolveResult, TaskAssociation,
};

impl TaskAssociation {
    /// First container of the task; its logical name labels every notification.
    pub fn primary_container(&self) -> Option<&ContainerDescriptor> {
        self.containers.first()
    }
}

/// Where task associations come from when the cache misses.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, container_id: &str) -> ResolveResult<TaskAssociation>;
}

/// ECS agent introspection endpoint (`GET <endpoint>?dockerid=<id>`).
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMetadataSource {
    pub fn new(endpoint: &str, timeout: Duration) -> ResolveResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(HttpMetadataSource {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch(&self, container_id: &str) -> ResolveResult<TaskAssociation> {
        let task = self
            .client
            .get(&self.endpoint)
            .query(&[("dockerid", container_id)])
            .send()
            .await?
            .error_for_status()?
            .json::<TaskAssociation>()
            .await?;

        Ok(task)
    }
}

/// Cache-first lookup of the task owning a container.
///
/// The resolver holds no state of its own: the cache is passed in by its owner,
/// and only successful, non-empty answers are stored. Misses and transport
/// failures are not remembered, so the next event for the same container asks
/// the agent again.
pub struct TaskResolver<S> {
    source: S,
}

impl<S: MetadataSource> TaskResolver<S> {
    pub fn new(source: S) -> Self {
        TaskResolver { source }
    }

    pub async fn resolve(
        &self,
        cache: &mut CorrelationCache,
        container_id: &str,
    ) -> ResolveResult<Arc<TaskAssociation>> {
        if let Some(task) = cache.get(container_id) {
            return Ok(task.clone());
        }

        let task = self.source.fetch(container_id).await?;
        if task.arn.is_empty() {
            return Err(ResolveError::not_found(container_id));
        }

        debug!(container = %container_id, task = %task.arn, "resolved task association");
        let task = Arc::new(task);
        cache.insert(container_id, task.clone());
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        Json, Router,
        extract::{Query, State},
        routing::get,
    };
    use rstest::rstest;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    /// Replays queued answers and counts how often it was asked.
    #[derive(Default)]
    struct ScriptedSource {
        answers: Mutex<VecDeque<ResolveResult<TaskAssociation>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn with(answers: Vec<ResolveResult<TaskAssociation>>) -> Self {
            ScriptedSource {
                answers: Mutex::new(answers.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetadataSource for ScriptedSource {
        async fn fetch(&self, _container_id: &str) -> ResolveResult<TaskAssociation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(TaskAssociation::default()))
        }
    }

    fn task(arn: &str) -> TaskAssociation {
        TaskAssociation {
            arn: arn.to_string(),
            family: "web".to_string(),
            containers: vec![ContainerDescriptor {
                docker_id: "abc123".to_string(),
                docker_name: "ecs-web-1-app-e4f2".to_string(),
                name: "app".to_string(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let resolver = TaskResolver::new(ScriptedSource::with(vec![Ok(task("arn:aws:ecs:task/1"))]));
        let mut cache = CorrelationCache::new();

        let first = resolver.resolve(&mut cache, "abc123").await.unwrap();
        let second = resolver.resolve(&mut cache, "abc123").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_arn_is_not_found_and_not_cached() {
        let resolver = TaskResolver::new(ScriptedSource::with(vec![
            Ok(TaskAssociation::default()),
            Ok(task("arn:aws:ecs:task/1")),
        ]));
        let mut cache = CorrelationCache::new();

        let err = resolver.resolve(&mut cache, "abc123").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "no task association for container abc123");
        assert!(!cache.contains("abc123"));

        let task = resolver.resolve(&mut cache, "abc123").await.unwrap();
        assert_eq!(task.arn, "arn:aws:ecs:task/1");
        assert_eq!(resolver.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transport_failure_is_retried_on_next_lookup() {
        let resolver = TaskResolver::new(ScriptedSource::with(vec![
            Err(ResolveError::Transport("connection refused".into())),
            Ok(task("arn:aws:ecs:task/1")),
        ]));
        let mut cache = CorrelationCache::new();

        let err = resolver.resolve(&mut cache, "abc123").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(cache.is_empty());

        assert!(resolver.resolve(&mut cache, "abc123").await.is_ok());
        assert!(cache.contains("abc123"));
    }

    #[derive(Clone)]
    struct FakeAgent {
        body: Value,
        queries: Arc<Mutex<Vec<String>>>,
    }

    async fn agent_tasks(
        State(agent): State<FakeAgent>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let id = params.get("dockerid").cloned().unwrap_or_default();
        agent.queries.lock().unwrap().push(id);
        Json(agent.body.clone())
    }

    async fn spawn_agent(body: Value) -> (String, Arc<Mutex<Vec<String>>>) {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/v1/tasks", get(agent_tasks))
            .with_state(FakeAgent {
                body,
                queries: queries.clone(),
            });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/v1/tasks", addr), queries)
    }

    #[tokio::test]
    async fn http_source_decodes_agent_payload() {
        let (endpoint, queries) = spawn_agent(json!({
            "Arn": "arn:aws:ecs:us-east-1:123456789012:task/8f1c",
            "DesiredStatus": "RUNNING",
            "KnownStatus": "RUNNING",
            "Family": "web",
            "Version": "3",
            "Containers": [
                {"DockerId": "abc123", "DockerName": "ecs-web-3-app-9a9a", "Name": "app"}
            ]
        }))
        .await;
        let source = HttpMetadataSource::new(&endpoint, Duration::from_secs(1)).unwrap();

        let task = source.fetch("abc123").await.unwrap();

        assert_eq!(task.arn, "arn:aws:ecs:us-east-1:123456789012:task/8f1c");
        assert_eq!(task.desired_status, "RUNNING");
        assert_eq!(task.primary_container().map(|c| c.name.as_str()), Some("app"));
        assert_eq!(*queries.lock().unwrap(), vec!["abc123".to_string()]);
    }

    #[rstest]
    #[case::lowercase_key(json!({"arn": ""}))]
    #[case::pascal_key(json!({"Arn": "", "Containers": []}))]
    #[case::no_task(json!({}))]
    #[tokio::test]
    async fn empty_agent_answer_is_requeried(#[case] body: Value) {
        let (endpoint, queries) = spawn_agent(body).await;
        let resolver =
            TaskResolver::new(HttpMetadataSource::new(&endpoint, Duration::from_secs(1)).unwrap());
        let mut cache = CorrelationCache::new();

        assert!(resolver.resolve(&mut cache, "abc123").await.unwrap_err().is_not_found());
        assert!(resolver.resolve(&mut cache, "abc123").await.unwrap_err().is_not_found());

        assert!(cache.is_empty());
        assert_eq!(queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unreachable_agent_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source = HttpMetadataSource::new(
            &format!("http://{}/v1/tasks", addr),
            Duration::from_millis(200),
        )
        .unwrap();

        let err = source.fetch("abc123").await.unwrap_err();

        assert!(matches!(err, ResolveError::Transport(_)));
    }
}
