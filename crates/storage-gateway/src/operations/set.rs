use super::{Outcome, RequestParams};
use crate::context::ServiceContext;
use crate::domain::{parse_decimal_u256, OperationError};

pub(super) async fn run(ctx: &ServiceContext, params: &RequestParams) -> Outcome {
    let Some(deployment) = ctx.snapshot() else {
        return Outcome::rejected("Cannot set value before deploying contract");
    };
    let Some(raw) = params.first("data") else {
        return Outcome::rejected("Invalid parameter, require 'data'");
    };
    let Some(value) = parse_decimal_u256(raw) else {
        return Outcome::rejected("Invalid parameter, 'data' must be a decimal integer");
    };

    let session = &deployment.session;
    let result = ctx
        .bounded(deployment.connection.transact(
            &session.contract,
            &session.transact_options,
            value,
        ))
        .await;

    match result {
        Ok(receipt) => Outcome::ok(format!("Hash of Transaction for Set: {:?}", receipt.hash)),
        Err(e) => Outcome::failed("Failed to set/store contract value", OperationError::Transact(e)),
    }
}
