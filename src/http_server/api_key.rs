//! # API Key Gate
//!
//! Request-scoped shared-secret check. The key is read from the `X-API-Key`
//! header, falling back to the `apikey` query parameter; an empty value counts
//! as absent.
//!
//! ## Invariants
//! - Comparison is constant-time with respect to the key contents

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use subtle::ConstantTimeEq;

use super::errors::ApiError;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying the API key
pub const API_KEY_QUERY: &str = "apikey";

/// Compares presented keys against the configured secret.
#[derive(Debug, Clone)]
pub struct ApiKeyGate {
    secret: Arc<str>,
}

impl ApiKeyGate {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret),
        }
    }

    /// Check a presented key
    pub fn check(&self, presented: Option<&str>) -> Result<(), ApiError> {
        let presented = presented.ok_or(ApiError::MissingCredential)?;
        if bool::from(presented.as_bytes().ct_eq(self.secret.as_bytes())) {
            Ok(())
        } else {
            Err(ApiError::InvalidCredential)
        }
    }
}

/// Extract the presented key from request parts.
pub fn presented_key(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(API_KEY_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .filter(|value| !value.is_empty());

    from_header.or_else(|| {
        let query = parts.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == API_KEY_QUERY)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    })
}

/// Extractor that succeeds only for requests carrying the configured key.
///
/// Runs before body extractors, so rejected uploads are never read.
#[derive(Debug, Clone, Copy)]
pub struct RequireApiKey;

#[async_trait]
impl<S> FromRequestParts<S> for RequireApiKey
where
    ApiKeyGate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = ApiKeyGate::from_ref(state);
        let presented = presented_key(parts);
        if let Err(err) = gate.check(presented.as_deref()) {
            tracing::debug!(path = %parts.uri.path(), code = err.code(), "API key rejected");
            return Err(err);
        }
        Ok(RequireApiKey)
    }
}
