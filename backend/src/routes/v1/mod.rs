/// User request routes
pub mod users;

use aide::axum::{
    routing::{delete, post},
    ApiRouter,
};
use axum::middleware;

use crate::middleware::{auth::auth_middleware, BearerAuth};

/// Creates the v1 API router; every v1 route requires a bearer token
pub fn handler(auth: BearerAuth) -> ApiRouter {
    ApiRouter::new()
        .api_route("/users", post(users::create_user))
        .api_route("/users/{email}", delete(users::delete_user))
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
}
