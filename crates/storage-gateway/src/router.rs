//! Dispatcher: maps request paths to operations and outcomes to responses.
//!
//! Routes are method-agnostic and driven by query parameters, so every
//! request lands in a single fallback handler.

use crate::context::ServiceContext;
use crate::middleware::GatewayMetrics;
use crate::operations::{Operation, Outcome, RequestParams};
use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ServiceContext>,
    pub metrics: Arc<GatewayMetrics>,
}

/// Router serving `/deploy`, `/get`, `/set` and `/summary`.
pub fn create_router(state: AppState) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

async fn dispatch(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(operation) = Operation::from_path(uri.path()) else {
        return text(StatusCode::NOT_FOUND, "404 page not found");
    };

    let params = match Query::<Vec<(String, String)>>::try_from_uri(&uri) {
        Ok(Query(pairs)) => RequestParams::new(pairs),
        Err(e) => {
            warn!(operation = operation.name(), error = %e, "Malformed query string");
            state.metrics.record(operation, StatusCode::BAD_REQUEST, 0);
            return text(StatusCode::BAD_REQUEST, "Invalid query string");
        }
    };

    let started = Instant::now();
    let outcome = operation.invoke(&state.context, &params).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    state.metrics.record(operation, outcome.status, elapsed_ms);

    translate(operation, outcome)
}

/// Turn an outcome into a response, logging any error it carries.
///
/// Server errors never echo the error detail to the client.
pub fn translate(operation: Operation, outcome: Outcome) -> Response {
    let Outcome {
        status,
        body,
        error,
    } = outcome;

    let body = match error {
        None => body,
        Some(err) if status.is_server_error() => {
            error!(
                operation = operation.name(),
                "HTTP status {}: err {:?}",
                status.as_u16(),
                err.to_string()
            );
            format!(
                "{}: {}",
                body,
                status.canonical_reason().unwrap_or("Internal Server Error")
            )
        }
        Some(err) => {
            warn!(
                operation = operation.name(),
                "HTTP status {}: err {:?}",
                status.as_u16(),
                err.to_string()
            );
            format!("{}: {}", body, err)
        }
    };

    text(status, body)
}

fn text(status: StatusCode, body: impl Into<String>) -> Response {
    let mut body = body.into();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    (status, body).into_response()
}
