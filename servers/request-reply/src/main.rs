use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use work_queue::{signal::shutdown_signal, SqsTransport};

/// Which half of the request/reply pipeline this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// HTTP server that queues incoming requests
    Producer,
    /// Worker that processes queued requests
    Consumer,
}

#[derive(Debug, Parser)]
#[command(version, about = "Request/reply service over a work queue")]
struct Cli {
    /// Mode to run in
    #[arg(long, env = "APP_MODE", value_enum)]
    mode: Mode,
}

fn init_tracing(json: bool) {
    if json {
        fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        fmt().with_env_filter(EnvFilter::from_default_env()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let shutdown_token = CancellationToken::new();
    let signal_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.cancel();
    });

    match cli.mode {
        Mode::Producer => {
            let environment = backend::types::Environment::from_env();
            init_tracing(environment.json_logs());
            info!("Starting in producer mode ({:?})", environment);

            let transport = Arc::new(SqsTransport::from_config(&environment.aws_config().await));
            backend::run(environment, transport, shutdown_token).await
        }
        Mode::Consumer => {
            let environment = queue_worker::types::Environment::from_env();
            init_tracing(environment.json_logs());
            info!("Starting in consumer mode ({:?})", environment);

            let transport = Arc::new(SqsTransport::from_config(&environment.aws_config().await));
            queue_worker::run(&environment, transport, shutdown_token).await
        }
    }
}
