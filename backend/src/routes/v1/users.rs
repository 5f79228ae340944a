use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, Extension, Json};
use common_types::{CreateUserPayload, DeleteUserPayload};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use crate::{
    middleware::AuthenticatedCaller,
    types::{AppError, ValidatedJson},
    user_queue::UserRequestQueue,
};

/// Request to create a user
#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate)]
pub struct CreateUserRequest {
    /// Display name
    #[validate(length(min = 1))]
    pub name: String,

    /// Email address
    #[validate(length(min = 1), email)]
    pub email: String,

    /// Initial password
    #[validate(length(min = 1))]
    pub password: String,

    /// Age in years
    #[validate(range(min = 1))]
    pub age: u32,
}

impl From<CreateUserRequest> for CreateUserPayload {
    fn from(request: CreateUserRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            password: request.password,
            age: request.age,
        }
    }
}

/// Path of a user resource
#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct UserPath {
    /// Email address of the user
    #[validate(email)]
    pub email: String,
}

/// Response for an accepted request
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnqueuedResponse {
    /// Id of the queued message
    pub message_id: String,
    /// Always `queued`
    pub status: String,
}

impl EnqueuedResponse {
    fn queued(message_id: String) -> (StatusCode, Json<Self>) {
        (
            StatusCode::ACCEPTED,
            Json(Self {
                message_id,
                status: "queued".to_string(),
            }),
        )
    }
}

/// Queue a user creation
///
/// The user is created asynchronously by the worker.
///
/// # Returns
///
/// Returns `202 ACCEPTED` with the id of the queued message
///
/// # Errors
///
/// - `400 BAD_REQUEST` - Invalid JSON or field values
/// - `401 UNAUTHORIZED` - Invalid or missing authentication
/// - `503 SERVICE_UNAVAILABLE` - The queue could not be reached
#[instrument(skip_all)]
pub async fn create_user(
    _caller: AuthenticatedCaller,
    Extension(user_queue): Extension<Arc<UserRequestQueue>>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<EnqueuedResponse>), AppError> {
    let message_id = user_queue
        .enqueue_create(&CreateUserPayload::from(payload))
        .await?;

    tracing::info!(%message_id, "Queued user creation");
    Ok(EnqueuedResponse::queued(message_id))
}

/// Queue a user deletion
///
/// # Returns
///
/// Returns `202 ACCEPTED` with the id of the queued message
///
/// # Errors
///
/// - `400 BAD_REQUEST` - The path is not an email address
/// - `401 UNAUTHORIZED` - Invalid or missing authentication
/// - `503 SERVICE_UNAVAILABLE` - The queue could not be reached
#[instrument(skip_all)]
pub async fn delete_user(
    _caller: AuthenticatedCaller,
    Extension(user_queue): Extension<Arc<UserRequestQueue>>,
    Path(path): Path<UserPath>,
) -> Result<(StatusCode, Json<EnqueuedResponse>), AppError> {
    path.validate()?;

    let message_id = user_queue
        .enqueue_delete(&DeleteUserPayload { email: path.email })
        .await?;

    tracing::info!(%message_id, "Queued user deletion");
    Ok(EnqueuedResponse::queued(message_id))
}
