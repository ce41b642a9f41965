//! HTTP handler for the broker endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Issue a token for the proxy-asserted caller |
//! | other | `/` | `405 Method not allowed` |
//!
//! Errors are returned as plain text embedding the underlying message.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use super::{CallerIdentity, TokenBroker};
use crate::config::IdentitySource;
use crate::{Error, Result};

/// Upper bound on a body-variant request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the broker router.
pub fn broker_routes(broker: Arc<TokenBroker>) -> Router {
    Router::new()
        .route("/", any(token_handler))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(broker)
}

/// `GET /` — issue a token for the caller.
async fn token_handler(
    State(broker): State<Arc<TokenBroker>>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    match handle(&broker, &headers, body).await {
        Ok(response) => response,
        Err(e) => e.to_http_response().into_response(),
    }
}

async fn handle(broker: &TokenBroker, headers: &HeaderMap, body: Body) -> Result<Response> {
    let (identity, policies) = match broker.identity_config().source {
        IdentitySource::Headers => {
            let identity = CallerIdentity::from_headers(headers, broker.identity_config());
            let policies = broker.authorize(&identity)?;
            (identity, policies)
        }
        IdentitySource::Body => {
            let bytes = to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|e| Error::BodyRead(e.to_string()))?;
            (CallerIdentity::from_body(&bytes)?, Vec::new())
        }
    };

    let secret = broker.issue(&identity, &policies).await?;
    broker.deliver(&secret)
}
