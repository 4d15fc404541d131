mod client;
mod error;
mod markdown;
mod models;
mod relevance;
mod views;

use std::io::IsTerminal;
use std::process::exit;

use clap::Parser;
use client::Client;
use client::Color;
use client::Commands;
use client::healthcheck::healthcheck_cmd;
use client::runserver::runserver;
use colored::control::set_override;
use common::tracing::Stream;
use common::tracing::TracingConfig;
use common::tracing::create_tracing_subscriber;
use tracing_subscriber::util::SubscriberInitExt as _;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(_) => (),
        Err(e) => {
            eprintln!("{e:?}");
            exit(2);
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let client = Client::parse();

    let exporter = client.telemetry_config.span_exporter()?;
    let tracing_config = TracingConfig {
        stream: Stream::Stderr,
        telemetry: client.telemetry_config.telemetry(),
    };
    create_tracing_subscriber(
        tracing_config,
        tracing_subscriber::filter::LevelFilter::INFO,
        exporter,
    )
    .init();

    match client.color {
        Color::Never => set_override(false),
        Color::Always => set_override(true),
        Color::Auto => set_override(std::io::stderr().is_terminal()),
    }

    match client.command {
        Commands::Runserver(args) => {
            runserver(*args, client.backend_config, client.app_version).await
        }
        Commands::Healthcheck(args) => healthcheck_cmd(args, client.backend_config).await,
    }
}
