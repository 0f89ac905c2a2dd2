use super::Outcome;
use crate::context::ServiceContext;

pub(super) async fn run(ctx: &ServiceContext) -> Outcome {
    match ctx.deploy().await {
        Ok(deployment) => Outcome::ok(format!(
            "Contract deployed at {:?}; transaction {:?}",
            deployment.session.contract_address(),
            deployment.transaction
        )),
        Err(e) => Outcome::failed(e.headline(), e.into()),
    }
}
