use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cadence_proxy::config::{EnvConfig, ProxySettings};
use cadence_proxy::engine::InMemoryEngine;
use cadence_proxy::logger::init_tracing;
use cadence_proxy::{ProxyDispatcher, transport};
use clap::{Args, Parser, Subcommand};
use proxy_message::MessageType;
use strum::IntoEnumIterator;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "cadence-proxy",
    about = "Bridges a workflow client library to a Cadence-style engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the proxy
    Run(RunArgs),

    /// Print every message type with its code and direction
    MessageTypes,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Address to accept library connections on (e.g. 127.0.0.1:5000)
    #[arg(long)]
    listen: Option<String>,

    /// Log level override (e.g. error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Write rolling log files into this directory instead of stdout
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// OpenTelemetry endpoint (e.g. http://localhost:4318)
    #[arg(long)]
    otel_endpoint: Option<String>,

    /// Deadline for requests sent to the library
    #[arg(long)]
    request_timeout_ms: Option<u64>,

    /// `.env` file with PROXY_* settings
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run(RunArgs {
        env_file: PathBuf::from(".env"),
        ..Default::default()
    })) {
        Commands::Run(args) => run(args).await,
        Commands::MessageTypes => {
            print_message_types();
            Ok(())
        }
    }
}

fn print_message_types() {
    println!("{:>5}  {:<44} {}", "CODE", "NAME", "DIRECTION");
    for message_type in MessageType::iter().filter(|t| *t != MessageType::Unspecified) {
        let direction = message_type
            .direction()
            .map(|d| d.to_string())
            .unwrap_or_default();
        println!("{:>5}  {:<44} {}", message_type.code(), message_type.as_ref(), direction);
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = EnvConfig::new(&args.env_file);
    let mut settings = ProxySettings::load(&config).await;
    if let Some(listen) = args.listen {
        settings.listen_address = listen;
    }
    if let Some(level) = args.log_level {
        settings.log.log_level = level;
    }
    if let Some(dir) = args.log_dir {
        settings.log.log_dir = Some(dir);
    }
    if let Some(endpoint) = args.otel_endpoint {
        settings.log.otel_endpoint = Some(endpoint);
    }
    if let Some(timeout_ms) = args.request_timeout_ms {
        settings.request_timeout = Duration::from_millis(timeout_ms);
    }

    let telemetry = init_tracing(&settings.log).context("could not set up logging")?;

    let engine = Arc::new(InMemoryEngine::new());
    let (dispatcher, mut outbound) = ProxyDispatcher::new(engine, settings.request_timeout);
    let mut shutdown = dispatcher.subscribe_shutdown();

    let listener = TcpListener::bind(&settings.listen_address)
        .await
        .with_context(|| format!("could not listen on {}", settings.listen_address))?;
    info!(address = %settings.listen_address, "cadence-proxy listening; press Ctrl-C to exit");

    // one library connection at a time; queued proxy requests wait for the next one
    let serving = async {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(%err, "accept failed");
                    continue;
                }
            };
            info!(%peer, "library connected");
            if let Err(err) = stream.set_nodelay(true) {
                warn!(%err, "could not disable Nagle");
            }
            let max_frame = settings.max_frame_bytes;
            let served = transport::serve(stream, &dispatcher, &mut outbound, max_frame).await;
            if let Err(err) = served {
                error!(%peer, %err, "connection ended with an error");
            }
        }
    };

    tokio::select! {
        _ = serving => {}
        result = tokio::signal::ctrl_c() => {
            result.context("could not listen for Ctrl-C")?;
            info!("Ctrl-C received");
        }
        _ = shutdown.wait_for(|stop| *stop) => {
            // let the terminate reply reach the library
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    info!(
        workflows = dispatcher.workflows().len(),
        pending = dispatcher.correlator().pending_count(),
        "cadence-proxy shutting down"
    );
    telemetry.shutdown();
    Ok(())
}
