use std::{sync::Arc, time::Duration};

use aide::openapi::OpenApi;
use axum::{Extension, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use work_queue::QueueMonitor;

use crate::routes;
use crate::{middleware::BearerAuth, types::Environment, user_queue::UserRequestQueue};

/// Upper bound on a single request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the application router with its OpenAPI document and dependencies
pub fn router(
    environment: Environment,
    user_queue: Arc<UserRequestQueue>,
    monitor: QueueMonitor,
    auth: BearerAuth,
) -> Router {
    let mut openapi = OpenApi::default();

    routes::handler(auth)
        .finish_api(&mut openapi)
        .layer(Extension(openapi))
        .layer(Extension(environment))
        .layer(Extension(user_queue))
        .layer(Extension(monitor))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// Starts the server with the given environment and dependencies
///
/// # Errors
///
/// Returns an error if the server fails to start or bind to the port
pub async fn start(
    environment: Environment,
    user_queue: Arc<UserRequestQueue>,
    monitor: QueueMonitor,
    auth: BearerAuth,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    let router = router(environment, user_queue, monitor, auth);

    let addr = std::net::SocketAddr::from((
        [0, 0, 0, 0],
        std::env::var("PORT").map_or(Ok(8001), |p| p.parse())?,
    ));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Request Reply backend started on http://{addr}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await
        .map_err(anyhow::Error::from)
}
