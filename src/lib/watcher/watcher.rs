use std::{collections::HashSet, fmt::Display, sync::Arc, time::Duration};

use super::types::{
    Connector, CorrelateError, CorrelateResult, Correlator, DockerConnector, EventOutcome,
    WatchResult,
};
use crate::lib::{
    config::types::Settings,
    notify::{
        publisher::spawn_dispatcher,
        types::{LogPublisher, NotificationQueue, Publisher, SnsPublisher, StatusNotification},
    },
    runtime::types::{DockerRuntime, RuntimeClient, RuntimeEvent, RuntimeResult},
    status::state::{classify, is_terminal},
    tasks::{
        resolver::{HttpMetadataSource, MetadataSource, TaskResolver},
        types::CorrelationCache,
    },
};
use async_trait::async_trait;
use futures_util::stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Container statuses whose task associations are resolved before subscribing.
const WARM_STATUSES: [&str; 2] = ["created", "running"];

impl<S: MetadataSource> Correlator<S> {
    pub fn new(resolver: TaskResolver<S>, cluster_name: &str) -> Self {
        Correlator {
            resolver,
            cache: CorrelationCache::new(),
            cluster_name: cluster_name.to_string(),
        }
    }

    /// Resolves every live container so the cache is warm before the first event.
    ///
    /// Entries for containers that are no longer live are dropped first: their
    /// destroy event may have been missed while the subscription was down.
    /// Returns how many containers were newly resolved.
    pub async fn warm_cache<R: RuntimeClient + ?Sized>(&mut self, runtime: &R) -> usize {
        let ids = match runtime.list_containers(&WARM_STATUSES).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "cannot list containers, skipping cache warm-up");
                return 0;
            }
        };

        if !self.cache.is_empty() {
            let live: HashSet<&str> = ids.iter().map(String::as_str).collect();
            let pruned = self.cache.retain_live(&live);
            if pruned > 0 {
                info!(pruned, "dropped associations of vanished containers");
            }
        }

        let mut resolved = 0;
        for id in ids {
            if self.cache.contains(&id) {
                continue;
            }

            match runtime.inspect(&id).await {
                Ok(state) => debug!(container = %id, state = ?state, "inspected"),
                Err(err) => {
                    warn!(container = %id, error = %err, "inspect failed");
                    continue;
                }
            }

            match self.resolver.resolve(&mut self.cache, &id).await {
                Ok(task) => {
                    debug!(container = %id, task = %task.arn, "tracking");
                    resolved += 1;
                }
                Err(err) => debug!(container = %id, error = %err, "not tracked"),
            }
        }

        info!(resolved, cached = self.cache.len(), "cache warm-up complete");
        resolved
    }

    /// Correlates a single event. Never touches the event feed itself.
    pub async fn handle_event<R: RuntimeClient + ?Sized>(
        &mut self,
        runtime: &R,
        event: RuntimeEvent,
    ) -> CorrelateResult<EventOutcome> {
        if event.id.is_empty() || event.action.is_empty() {
            return Ok(EventOutcome::Malformed);
        }

        if event.action == "destroy" {
            let tracked = self.cache.evict(&event.id).is_some();
            info!(container = %event.id, tracked, cached = self.cache.len(), "container destroyed");
            return Ok(EventOutcome::Evicted { tracked });
        }

        let task = self.resolver.resolve(&mut self.cache, &event.id).await?;
        let container = task
            .primary_container()
            .ok_or_else(|| CorrelateError::NoContainers {
                task_arn: task.arn.clone(),
            })?;

        // Inspection failure degrades to the plain action mapping.
        let state = if is_terminal(&event.action) {
            match runtime.inspect(&event.id).await {
                Ok(state) => Some(state),
                Err(err) => {
                    warn!(container = %event.id, error = %err, "inspect failed, publishing without exit details");
                    None
                }
            }
        } else {
            None
        };

        let classification = classify(&event.action, state.as_ref());
        if let Some(err) = &classification.timestamp_error {
            warn!(container = %event.id, error = %err, "run time not reported");
        }

        Ok(EventOutcome::Notify(StatusNotification {
            id: event.id,
            status: classification.status,
            cluster: self.cluster_name.clone(),
            image: event.from,
            task: container.name.clone(),
            exit_code: classification.exit_code,
            elapsed_secs: classification.elapsed_secs,
            failure_reason: classification.failure_reason,
        }))
    }

    /// Consumes one event subscription until the feed ends.
    ///
    /// Per-event failures are logged and skipped. `Ok` means the runtime closed
    /// the feed; `Err` means the feed itself broke. Either way the caller has to
    /// resubscribe.
    pub async fn run_subscription<R: RuntimeClient + ?Sized>(
        &mut self,
        runtime: &R,
        queue: &NotificationQueue,
    ) -> CorrelateResult<()> {
        let mut events = runtime.events();

        while let Some(next) = events.next().await {
            let event = next.map_err(CorrelateError::StreamFatal)?;
            let (id, action) = (event.id.clone(), event.action.clone());

            match self.handle_event(runtime, event).await {
                Ok(EventOutcome::Notify(notification)) => {
                    info!(container = %id, action = %action, status = %notification.status, "status change");
                    queue.enqueue(notification);
                }
                Ok(EventOutcome::Malformed) => debug!("dropping malformed event"),
                Ok(EventOutcome::Evicted { .. }) => {}
                // Containers outside ECS never resolve; that is expected.
                Err(CorrelateError::Resolve(err)) if err.is_not_found() => {
                    debug!(container = %id, action = %action, "no task, event dropped")
                }
                Err(err) => warn!(container = %id, action = %action, error = %err, "event dropped"),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Connector for DockerConnector {
    type Runtime = DockerRuntime;

    async fn runtime(&self) -> RuntimeResult<DockerRuntime> {
        DockerRuntime::connect(&self.socket)
    }

    async fn publisher(&self) -> Arc<dyn Publisher> {
        if self.dry_run {
            Arc::new(LogPublisher)
        } else {
            Arc::new(SnsPublisher::connect(&self.region, &self.topic_arn).await)
        }
    }
}

impl From<&Settings> for DockerConnector {
    fn from(settings: &Settings) -> Self {
        DockerConnector {
            socket: settings.docker_socket.clone(),
            region: settings.region.clone(),
            topic_arn: settings.topic_arn.clone(),
            dry_run: settings.dry_run,
        }
    }
}

/// Builds a fresh runtime client and publisher and consumes one subscription.
async fn run_once<S: MetadataSource, C: Connector>(
    connector: &C,
    correlator: &mut Correlator<S>,
) -> WatchResult<()> {
    let runtime = connector.runtime().await?;
    let (queue, _dispatcher) = spawn_dispatcher(connector.publisher().await);

    correlator.warm_cache(&runtime).await;

    info!("subscribed to container events");
    match correlator.run_subscription(&runtime, &queue).await {
        Ok(()) => info!("event stream ended"),
        Err(err) => error!(error = %err, "event subscription lost"),
    }

    Ok(())
}

/// Subscribes, consumes, backs off and resubscribes, forever.
///
/// The correlator, and with it the cache, outlives every reconnect.
pub async fn reconnect_loop<S: MetadataSource, C: Connector>(
    correlator: &mut Correlator<S>,
    connector: &C,
    delay: Duration,
) {
    loop {
        if let Err(err) = run_once(connector, correlator).await {
            error!(error = %err, "cannot start subscription");
        }

        tokio::time::sleep(delay).await;
        info!(cached = correlator.cache.len(), "reinitialising runtime client");
    }
}

/// Calls `build` until it succeeds, sleeping `delay` after every failure.
async fn retry_build<T, E: Display>(
    what: &str,
    delay: Duration,
    mut build: impl FnMut() -> Result<T, E>,
) -> T {
    loop {
        match build() {
            Ok(value) => return value,
            Err(err) => {
                error!(error = %err, "cannot build {}, retrying", what);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Runs the watcher until the process is stopped.
pub async fn watch(settings: Settings) {
    let source = retry_build("metadata client", settings.reconnect, || {
        HttpMetadataSource::new(&settings.metadata_url, settings.metadata_timeout)
    })
    .await;
    let mut correlator = Correlator::new(TaskResolver::new(source), &settings.cluster_name);

    reconnect_loop(&mut correlator, &DockerConnector::from(&settings), settings.reconnect).await
}
