use std::error::Error;

use clap::Parser;
use tracing::info;

use crate::lib::{
    config::{
        config::init_tracing,
        types::{Cli, Settings},
    },
    watcher::watcher::watch,
};

mod lib {
    pub mod config;
    pub mod notify;
    pub mod runtime;
    pub mod status;
    pub mod tasks;
    pub mod watcher;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let settings = Settings::from(Cli::parse());
    init_tracing(&settings.log_level)?;

    info!(
        topic = %settings.topic_arn,
        region = %settings.region,
        cluster = %settings.cluster_name,
        dry_run = settings.dry_run,
        "starting ECS status watcher"
    );

    // In-flight publishes are abandoned on shutdown.
    tokio::select! {
        _ = watch(settings) => {}
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    Ok(())
}
