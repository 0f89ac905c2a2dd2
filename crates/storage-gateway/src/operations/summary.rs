use super::{Outcome, RequestParams};
use crate::context::ServiceContext;
use crate::domain::{parse_hash, OperationError};

pub(super) async fn run(ctx: &ServiceContext, params: &RequestParams) -> Outcome {
    let Some(connection) = ctx.current_connection() else {
        return Outcome::rejected("Cannot get transaction before deploying contract");
    };
    let Some(raw) = params.first("hash") else {
        return Outcome::rejected("Invalid parameter, require 'hash'");
    };
    let Some(hash) = parse_hash(raw) else {
        return Outcome::rejected("Invalid parameter, 'hash' must be a 32-byte hex string");
    };

    match ctx.bounded(connection.fetch_transaction(hash)).await {
        Ok(record) => Outcome::ok(format!(
            "Transaction pending? {}; details: {}",
            record.is_pending(),
            record
        )),
        Err(e) => Outcome::failed("Failed to get transaction details", OperationError::Fetch(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{SimulatedChain, Stage};
    use crate::domain::ChainError;
    use crate::operations::tests::context;
    use axum::http::StatusCode;

    const HASH: &str = "0x378674bebd1430d9ce63adc792c573da56e69b8d6c97174c93a43c5991ae0d61";

    fn params(pairs: &[(&str, &str)]) -> RequestParams {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_summary_before_deploy() {
        let chain = SimulatedChain::new();
        let outcome = run(&context(&chain), &params(&[("hash", HASH)])).await;
        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert_eq!(outcome.body, "Cannot get transaction before deploying contract");
        assert_eq!(chain.calls(Stage::Fetch), 0);
    }

    #[tokio::test]
    async fn test_summary_validation() {
        let chain = SimulatedChain::new();
        let ctx = context(&chain);
        ctx.deploy().await.unwrap();

        let missing = run(&ctx, &params(&[])).await;
        assert_eq!(missing.body, "Invalid parameter, require 'hash'");

        let malformed = run(&ctx, &params(&[("hash", "0x1234")])).await;
        assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            malformed.body,
            "Invalid parameter, 'hash' must be a 32-byte hex string"
        );
        assert!(malformed.error.is_none());
        assert_eq!(chain.calls(Stage::Fetch), 0);
    }

    #[tokio::test]
    async fn test_summary_unknown_hash() {
        let chain = SimulatedChain::new();
        let ctx = context(&chain);
        ctx.deploy().await.unwrap();

        let outcome = run(&ctx, &params(&[("hash", HASH)])).await;
        assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(outcome.body, "Failed to get transaction details");
        assert!(matches!(
            outcome.error,
            Some(OperationError::Fetch(ChainError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_summary_reports_pending_then_mined() {
        let chain = SimulatedChain::new();
        let ctx = context(&chain);
        let deployment = ctx.deploy().await.unwrap();
        chain.set_confirm_after(1);

        let session = &deployment.session;
        let receipt = deployment
            .connection
            .transact(&session.contract, &session.transact_options, 42u64.into())
            .await
            .unwrap();
        let hash = format!("{:?}", receipt.hash);

        let first = run(&ctx, &params(&[("hash", &hash)])).await;
        assert!(first.body.starts_with("Transaction pending? true; details: "));
        let second = run(&ctx, &params(&[("hash", &hash)])).await;
        assert!(second.body.starts_with("Transaction pending? false; details: "));
        assert!(second.body.contains("Contract: false"));
    }
}
