mod docs;
mod health;
/// Versioned API routes
pub mod v1;

use aide::axum::{routing::get, ApiRouter};

use crate::middleware::BearerAuth;

/// Creates the router with all handler routes
pub fn handler(auth: BearerAuth) -> ApiRouter {
    ApiRouter::new()
        .merge(docs::handler())
        .api_route("/health", get(health::handler))
        .nest("/v1", v1::handler(auth))
}
