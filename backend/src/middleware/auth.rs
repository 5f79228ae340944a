use std::{collections::HashSet, sync::Arc};

use aide::OperationIo;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::types::AppError;

/// Checks bearer tokens against the configured set
///
/// An empty set accepts any non-empty bearer token.
#[derive(Debug, Clone, Default)]
pub struct BearerAuth {
    tokens: Arc<HashSet<String>>,
}

impl BearerAuth {
    /// Creates a checker accepting `tokens`
    #[must_use]
    pub fn new(tokens: HashSet<String>) -> Self {
        Self {
            tokens: Arc::new(tokens),
        }
    }

    /// Whether `token` is accepted
    #[must_use]
    pub fn accepts(&self, token: &str) -> bool {
        !token.is_empty() && (self.tokens.is_empty() || self.tokens.contains(token))
    }
}

/// Caller authenticated by a bearer token
#[derive(Debug, Clone, OperationIo)]
pub struct AuthenticatedCaller {
    /// The accepted bearer token
    pub token: String,
}

/// Axum extractor for the authenticated caller
///
/// Only available on routes behind [`auth_middleware`].
impl<S> FromRequestParts<S> for AuthenticatedCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            AppError::new(
                StatusCode::UNAUTHORIZED,
                "missing_auth",
                "Authentication required but caller not found in request extensions",
                false,
            )
        })
    }
}

/// Bearer token authentication middleware
///
/// Adds [`AuthenticatedCaller`] to the request extensions.
///
/// # Errors
///
/// - `401 missing_token` - no `Authorization: Bearer` header
/// - `401 invalid_token` - the token is not accepted
pub async fn auth_middleware(
    State(auth): State<BearerAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::new(
                StatusCode::UNAUTHORIZED,
                "missing_token",
                "Authorization header must contain a valid Bearer token",
                false,
            )
        })?;

    if !auth.accepts(token) {
        return Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            "Invalid token",
            false,
        ));
    }

    let caller = AuthenticatedCaller {
        token: token.to_string(),
    };
    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}
