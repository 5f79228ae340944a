use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use queue_worker::types::Environment;
use work_queue::{signal::shutdown_signal, SqsTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = Environment::from_env();

    // Initialize tracing
    if env.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }
    info!("Starting queue worker in {:?} environment", env);

    let transport = Arc::new(SqsTransport::from_config(&env.aws_config().await));

    // Spawn signal handler
    let shutdown_token = CancellationToken::new();
    let signal_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.cancel();
    });

    queue_worker::run(&env, transport, shutdown_token).await?;

    info!("Queue worker stopped");
    Ok(())
}
