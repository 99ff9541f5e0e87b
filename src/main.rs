use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use collector_stream::config::{CollectorConfig, TransportKind};
use collector_stream::discovery::{ManifestDiscovery, ProviderCatalog};
use collector_stream::messaging::{InMemoryTransport, KafkaTransport, Transport};
use collector_stream::metrics::{self, Metrics, SharedHealth};
use collector_stream::module::{StreamModuleContext, StreamModuleInstaller};
use collector_stream::worker::Role;
use collector_stream::workers::{SpanSegment, SEGMENT_AGGREGATE};

#[derive(Parser, Debug)]
#[command(name = "collector-stream", version, about = "Role-addressed worker dispatch for a collector node")]
struct Args {
    /// Collector configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override [node].id from the configuration
    #[arg(long)]
    node_id: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Dispatch this many synthetic span segments after bring-up
    #[arg(long, default_value_t = 0)]
    demo_segments: u64,
}

fn init_tracing(json: bool) {
    // Default to INFO level, can be overridden with RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,collector_stream=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true).with_thread_ids(true)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = match &args.config {
        Some(path) => CollectorConfig::load(path)?,
        None => CollectorConfig::default(),
    };
    if let Some(node_id) = args.node_id {
        config.node.id = node_id;
    }

    tracing::info!(node = %config.node.id, transport = ?config.transport.kind, "🚀 Starting collector stream node");

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);

    // === 2. Queue dependency ===
    let transport: Arc<dyn Transport> = match config.transport.kind {
        TransportKind::Memory => Arc::new(InMemoryTransport::new(config.transport.queue_capacity)),
        TransportKind::Kafka => {
            let kafka = KafkaTransport::new(&config.transport).context("Failed to create Kafka producer")?;
            if let Err(e) = kafka
                .probe(Duration::from_millis(config.transport.message_timeout_ms))
                .await
            {
                tracing::error!(brokers = %config.transport.brokers, error = %e, "Kafka brokers not reachable");
            }
            Arc::new(kafka)
        }
    };

    // === 3. Stream module bring-up ===
    let installer = StreamModuleInstaller::new(config.node.id.clone(), transport, metrics.clone());
    let discovery = ManifestDiscovery::from_path(&config.stream.manifest_path, ProviderCatalog::builtin());
    let module = Arc::new(
        installer
            .install(&discovery)
            .with_context(|| format!("Failed to install module '{}'", installer.group_name()))?,
    );

    for role in module.report().missing_roles() {
        tracing::warn!(role = %role, "Role has no provider on this node");
    }

    // === 4. Metrics HTTP server in background thread ===
    if config.metrics.enabled {
        let registry = metrics.registry().clone();
        let health: SharedHealth = module.clone();
        let port = config.metrics.port;
        std::thread::spawn(move || {
            let result = actix_web::rt::System::new().block_on(metrics::start_metrics_server(registry, health, port));
            if let Err(e) = result {
                tracing::error!(error = %e, "Metrics server error");
            }
        });
    }

    if args.demo_segments > 0 {
        tokio::spawn(run_demo(module.clone(), args.demo_segments));
    }

    tracing::info!("⏳ Running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;

    module.shutdown().await;
    tracing::info!("👋 Collector stream node stopped");
    Ok(())
}

async fn run_demo(module: Arc<StreamModuleContext>, count: u64) {
    const SERVICES: [&str; 3] = ["checkout", "cart", "search"];
    let role = Role::new(SEGMENT_AGGREGATE);

    tracing::info!(count, "📝 Dispatching synthetic span segments");

    for seq in 0..count {
        let segment = SpanSegment {
            service: SERVICES[(seq % SERVICES.len() as u64) as usize].to_string(),
            duration_ms: 5 + (seq * 7) % 120,
            is_error: seq % 13 == 0,
        };

        let payload = match serde_json::to_value(&segment) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode segment");
                continue;
            }
        };

        if let Err(e) = module.dispatch(&role, payload).await {
            tracing::warn!(seq, reason = e.reason(), error = %e, "Demo dispatch rejected");
        }
    }

    tracing::info!(count, "✅ Demo segments dispatched");
}
