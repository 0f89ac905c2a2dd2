use super::Outcome;
use crate::context::ServiceContext;
use crate::domain::OperationError;

pub(super) async fn run(ctx: &ServiceContext) -> Outcome {
    let Some(deployment) = ctx.snapshot() else {
        return Outcome::rejected("Cannot get value before deploying contract");
    };

    let session = &deployment.session;
    let result = ctx
        .bounded(
            deployment
                .connection
                .call(&session.contract, &session.call_options),
        )
        .await;

    match result {
        Ok(value) => Outcome::ok(format!("Stored value: {}", value)),
        Err(e) => Outcome::failed("Failed to get stored contract value", OperationError::Call(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{SimulatedChain, Stage};
    use crate::operations::tests::context;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_get_before_deploy() {
        let chain = SimulatedChain::new();
        let outcome = run(&context(&chain)).await;
        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert_eq!(outcome.body, "Cannot get value before deploying contract");
        assert_eq!(chain.calls(Stage::Call), 0);
    }

    #[tokio::test]
    async fn test_get_fresh_contract() {
        let chain = SimulatedChain::new();
        let ctx = context(&chain);
        ctx.deploy().await.unwrap();
        let outcome = run(&ctx).await;
        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.body, "Stored value: 0");
    }

    #[tokio::test]
    async fn test_get_chain_failure() {
        let chain = SimulatedChain::new();
        let ctx = context(&chain);
        ctx.deploy().await.unwrap();
        chain.fail(Stage::Call, "execution reverted");
        let outcome = run(&ctx).await;
        assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(outcome.body, "Failed to get stored contract value");
        assert!(matches!(outcome.error, Some(OperationError::Call(_))));
    }
}
