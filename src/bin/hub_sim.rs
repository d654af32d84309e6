//! Simulated hub: streams readings for `S-1..S-N` to `/ws/alerts`

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rackwatch::{
    HubId,
    api::types::{TelemetryAck, TelemetryFrame},
    monitors::cluster::round2,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Catalog id of the simulated hub
    #[arg(long)]
    hub: String,

    /// Telemetry endpoint
    #[arg(short, long, default_value = "ws://127.0.0.1:5053/ws/alerts")]
    url: String,

    /// Number of sensors, named S-1 .. S-N
    #[arg(short = 'n', long, default_value_t = 15)]
    sensors: usize,

    /// Seconds between batches
    #[arg(short, long, default_value_t = 10)]
    interval: u64,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("rackwatch", LevelFilter::DEBUG),
        ("rackwatch_hub_sim", LevelFilter::DEBUG),
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

/// Fake sensor noise, rounded like real readings
struct Noise(StdRng);

impl Noise {
    fn seeded() -> Self {
        Self(StdRng::from_entropy())
    }

    fn between(&mut self, low: f64, high: f64) -> f64 {
        round2(self.0.gen_range(low..=high))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init();
    let args = Args::parse();

    loop {
        if let Err(e) = run(&args).await {
            error!("{e:#}");
        }
        info!("reconnecting in 5s...");
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

async fn run(args: &Args) -> Result<()> {
    let (ws_stream, _) = connect_async(args.url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;

    info!("hub {} connected, simulating {} sensors", args.hub, args.sensors);

    let (mut write, mut read) = ws_stream.split();

    let reader = tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<TelemetryAck>(&text) {
                    Ok(ack) => debug!(
                        "ack: rack={} dominant={} tempA={} humiA={}",
                        ack.rack,
                        ack.dominant_sensor.as_deref().unwrap_or("-"),
                        ack.alerts.temp_a,
                        ack.alerts.humi_a
                    ),
                    Err(e) => warn!("unexpected reply: {e}"),
                },
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    let hub_id = HubId::new(args.hub.clone());
    let mut noise = Noise::seeded();
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));

    let result = loop {
        ticker.tick().await;
        debug!("sending sensor batch");

        let mut batch = Ok(());
        for i in 1..=args.sensors {
            let frame = TelemetryFrame {
                hub_id: hub_id.clone(),
                sensor_name: format!("S-{i}"),
                temperature: noise.between(20.0, 40.0),
                humidity: noise.between(30.0, 80.0),
            };

            let text = serde_json::to_string(&frame)?;
            if let Err(e) = write.send(Message::Text(text)).await {
                batch = Err(e).context("connection lost");
                break;
            }
        }

        if batch.is_err() || reader.is_finished() {
            break batch.and(Err(anyhow::anyhow!("server closed the connection")));
        }
    };

    reader.abort();
    result
}
