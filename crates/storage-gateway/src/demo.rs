//! Offline demo: deploy, set, get and summarize without an HTTP listener.

use crate::context::ServiceContext;
use crate::domain::U256;
use crate::operations::{Operation, Outcome, RequestParams};
use tracing::{error, info};

/// Demo failure: the step that failed and what it returned.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed with {status}: {body}")]
pub struct DemoError {
    pub operation: &'static str,
    pub status: u16,
    pub body: String,
}

/// Bodies returned by each step of a successful run.
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub deploy: String,
    pub set: String,
    pub get: String,
    pub summary: String,
}

/// Run Deploy → Set(`value`) → Get → Summary(set transaction) in order.
pub async fn run_demo(ctx: &ServiceContext, value: U256) -> Result<DemoReport, DemoError> {
    let deploy = step(ctx, Operation::Deploy, RequestParams::default()).await?;

    let set = step(
        ctx,
        Operation::Set,
        [("data", value.to_string())].into_iter().collect(),
    )
    .await?;

    let get = step(ctx, Operation::Get, RequestParams::default()).await?;

    let hash = set
        .rsplit(' ')
        .next()
        .map(str::to_string)
        .unwrap_or_default();
    let summary = step(ctx, Operation::Summary, [("hash", hash)].into_iter().collect()).await?;

    Ok(DemoReport {
        deploy,
        set,
        get,
        summary,
    })
}

async fn step(
    ctx: &ServiceContext,
    operation: Operation,
    params: RequestParams,
) -> Result<String, DemoError> {
    let Outcome {
        status,
        body,
        error,
    } = operation.invoke(ctx, &params).await;

    if status.is_success() {
        info!(operation = operation.name(), "{}", body);
        return Ok(body);
    }

    match &error {
        Some(e) => error!(operation = operation.name(), status = status.as_u16(), error = %e, "{}", body),
        None => error!(operation = operation.name(), status = status.as_u16(), "{}", body),
    }
    Err(DemoError {
        operation: operation.name(),
        status: status.as_u16(),
        body,
    })
}
