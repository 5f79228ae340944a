use std::sync::Arc;

use backend::types::Environment;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};
use work_queue::{signal::shutdown_signal, SqsTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env();

    // Use JSON format for staging/production, regular format for development
    if environment.json_logs() {
        fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        fmt().with_env_filter(EnvFilter::from_default_env()).init();
    }

    let transport = Arc::new(SqsTransport::from_config(&environment.aws_config().await));

    let shutdown_token = CancellationToken::new();
    let signal_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.cancel();
    });

    backend::run(environment, transport, shutdown_token).await
}
