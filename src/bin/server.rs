use anyhow::Context;
use clap::Parser;
use rackwatch::{
    api::{ApiConfig, ApiState, spawn_server},
    config::{Config, open_catalog, read_config_file},
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (defaults apply when omitted)
    #[arg(short)]
    file: Option<String>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init(verbose: u8) {
    dotenv::dotenv().ok();

    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = filter::Targets::new().with_targets(vec![
        ("rackwatch", level),
        ("rackwatch_server", level),
        ("tower_http", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    };

    let catalog = open_catalog(&config.storage).await?;

    if let Some(seed) = config.catalog.clone() {
        info!(
            "importing catalog: {} hubs, {} racks, {} clusters",
            seed.hubs.len(),
            seed.racks.len(),
            seed.clusters.len()
        );
        catalog
            .import(seed)
            .await
            .context("failed to import catalog from config")?;
    }

    let state = ApiState::new(
        catalog.clone(),
        config.aggregation_period(),
        config.idle_timeout(),
    );
    let aggregator = state.aggregator.clone();

    let api_config = ApiConfig {
        bind_addr: config.bind,
        auth_token: config.auth_token.clone(),
        enable_cors: true,
    };
    let addr = spawn_server(api_config, state).await?;

    info!("rackwatch running on {addr} (hubs: ws://{addr}/ws/alerts, controllers: ws://{addr}/ws/ac-control)");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("shutting down");
    if let Err(e) = aggregator.shutdown().await {
        warn!("aggregator already stopped: {e:#}");
    }
    catalog.close().await?;

    Ok(())
}
