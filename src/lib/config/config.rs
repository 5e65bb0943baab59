use std::time::Duration;

use super::types::{Cli, DEFAULT_TOPIC_ARN, Settings};

impl From<Cli> for Settings {
    fn from(cli: Cli) -> Self {
        let topic_arn = cli
            .arn
            .map(|arn| arn.trim().to_string())
            .filter(|arn| !arn.is_empty())
            .unwrap_or_else(|| DEFAULT_TOPIC_ARN.to_string());

        Settings {
            topic_arn,
            region: cli.region,
            cluster_name: cli.cluster_name,
            metadata_url: cli.metadata_url,
            metadata_timeout: Duration::from_millis(cli.metadata_timeout_ms),
            docker_socket: cli.docker_socket,
            reconnect: Duration::from_secs(cli.reconnect_secs),
            log_level: cli.log_level,
            dry_run: cli.dry_run,
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides `default_level`.
pub fn init_tracing(default_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["ecs-status-watcher", "--region", "eu-west-1"];
        argv.extend_from_slice(args);
        Settings::from(Cli::try_parse_from(argv).unwrap())
    }

    #[rstest]
    #[case::blank(&["--arn", "   "])]
    #[case::empty(&["--arn", ""])]
    fn blank_topic_falls_back_to_default(#[case] args: &[&str]) {
        assert_eq!(parse(args).topic_arn, DEFAULT_TOPIC_ARN);
    }

    #[test]
    fn flags_populate_settings() {
        let settings = parse(&[
            "--arn",
            "arn:aws:sns:eu-west-1:123456789012:status",
            "--cn",
            "prod",
            "--metadata-timeout-ms",
            "250",
            "--reconnect-secs",
            "3",
            "--dry-run",
        ]);

        assert_eq!(settings.topic_arn, "arn:aws:sns:eu-west-1:123456789012:status");
        assert_eq!(settings.region, "eu-west-1");
        assert_eq!(settings.cluster_name, "prod");
        assert_eq!(settings.metadata_timeout, Duration::from_millis(250));
        assert_eq!(settings.reconnect, Duration::from_secs(3));
        assert!(settings.dry_run);
    }

    #[test]
    fn long_cluster_flag_is_accepted() {
        assert_eq!(parse(&["--cluster-name", "staging"]).cluster_name, "staging");
    }
}
