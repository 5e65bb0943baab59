use std::time::Duration;

use clap::Parser;

/// Topic used when none is configured.
pub const DEFAULT_TOPIC_ARN: &str = "arn:aws:sns:us-east-1:560230448151:notifyMe";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_METADATA_URL: &str = "http://localhost:51678/v1/tasks";
pub const DEFAULT_DOCKER_SOCKET: &str = "unix:///var/run/docker.sock";

/// Command line of the watcher. Every flag can also come from the environment.
#[derive(Parser, Debug)]
#[command(
    name = "ecs-status-watcher",
    about = "Publishes ECS container status changes observed on the Docker event stream",
    version
)]
pub struct Cli {
    /// SNS topic ARN that receives status notifications.
    #[arg(long, env = "ARN", value_name = "ARN")]
    pub arn: Option<String>,

    /// AWS region of the topic.
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// ECS cluster name stamped on every notification.
    #[arg(
        long = "cluster-name",
        visible_alias = "cn",
        env = "CLUSTER_NAME",
        default_value = ""
    )]
    pub cluster_name: String,

    /// ECS agent task introspection endpoint.
    #[arg(long, env = "ECS_AGENT_URL", default_value = DEFAULT_METADATA_URL)]
    pub metadata_url: String,

    #[arg(long, env = "METADATA_TIMEOUT_MS", default_value_t = 1000)]
    pub metadata_timeout_ms: u64,

    #[arg(long, env = "DOCKER_SOCKET", default_value = DEFAULT_DOCKER_SOCKET)]
    pub docker_socket: String,

    /// Pause before resubscribing after the event stream ends.
    #[arg(long, env = "RECONNECT_SECS", default_value_t = 10)]
    pub reconnect_secs: u64,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log notifications instead of publishing them.
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub topic_arn: String,
    pub region: String,
    pub cluster_name: String,
    pub metadata_url: String,
    pub metadata_timeout: Duration,
    pub docker_socket: String,
    pub reconnect: Duration,
    pub log_level: String,
    pub dry_run: bool,
}
