/// Bearer token authentication
pub mod auth;

pub use auth::{AuthenticatedCaller, BearerAuth};
