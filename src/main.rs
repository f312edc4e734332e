//! # Cutout Server - Entry Point
//! src/main.rs

use anyhow::Context;
use cutout_server::config::Config;
use cutout_server::jobs::{Dispatcher, DispatcherConfig};
use cutout_server::outbox::OutboxSink;
use cutout_server::server::Server;
use cutout_server::transform::BackgroundRemover;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> anyhow::Result<()> {
    let config = Config::new();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();

    config.validate().context("invalid configuration")?;
    config.log_summary();

    let outbox = Arc::new(OutboxSink::new());
    let dispatcher = Dispatcher::start(
        DispatcherConfig::from_config(&config),
        Arc::new(BackgroundRemover),
        outbox.clone(),
    )
    .context("failed to start dispatcher")?;

    let mut server = Server::new(config, dispatcher, outbox);
    server.run().context("server stopped")?;

    Ok(())
}
