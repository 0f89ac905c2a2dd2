//! Request operations and the outcome they hand back to the dispatcher.
//!
//! Every operation has the same shape: it takes the service context and the
//! request's query parameters, and returns an [`Outcome`]. Validation
//! rejections carry no error object; chain failures carry an
//! [`OperationError`] that the dispatcher logs.

mod deploy;
mod get;
mod set;
mod summary;

use crate::context::ServiceContext;
use crate::domain::OperationError;
use axum::http::StatusCode;

/// Named operations served by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Deploy,
    Get,
    Set,
    Summary,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Deploy,
        Operation::Get,
        Operation::Set,
        Operation::Summary,
    ];

    /// Look up the operation for a request path. Matching is exact.
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/deploy" => Some(Operation::Deploy),
            "/get" => Some(Operation::Get),
            "/set" => Some(Operation::Set),
            "/summary" => Some(Operation::Summary),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Deploy => "deploy",
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::Summary => "summary",
        }
    }

    /// Run the operation against the shared context.
    pub async fn invoke(self, ctx: &ServiceContext, params: &RequestParams) -> Outcome {
        match self {
            Operation::Deploy => deploy::run(ctx).await,
            Operation::Get => get::run(ctx).await,
            Operation::Set => set::run(ctx, params).await,
            Operation::Summary => summary::run(ctx, params).await,
        }
    }
}

/// Query parameters in request order; duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams(Vec<(String, String)>);

impl RequestParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// First value for `key`. An empty value counts as absent.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Result of an operation: status, body and an optional error for the log.
#[derive(Debug)]
pub struct Outcome {
    pub status: StatusCode,
    pub body: String,
    pub error: Option<OperationError>,
}

impl Outcome {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
            error: None,
        }
    }

    /// Validation rejection: 400 with an explanatory body, nothing to log.
    pub fn rejected(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: body.into(),
            error: None,
        }
    }

    /// Chain failure: 500 with a fixed headline; the error goes to the log.
    pub fn failed(headline: impl Into<String>, error: OperationError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: headline.into(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{SimulatedChain, Stage};
    use crate::context::ContextSettings;
    use crate::domain::GatewayConfig;
    use std::sync::Arc;

    pub(super) fn context(chain: &SimulatedChain) -> ServiceContext {
        ServiceContext::new(
            ContextSettings::from(&GatewayConfig::default()),
            Arc::new(chain.clone()),
        )
    }

    #[test]
    fn test_route_lookup() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_path(&format!("/{}", op.name())), Some(op));
        }
        assert_eq!(Operation::from_path("/"), None);
        assert_eq!(Operation::from_path("/deploy/"), None);
        assert_eq!(Operation::from_path("/GET"), None);
    }

    #[test]
    fn test_first_param() {
        let params: RequestParams = [("data", ""), ("hash", "0x1"), ("hash", "0x2")]
            .into_iter()
            .collect();
        assert_eq!(params.first("hash"), Some("0x1"));
        assert_eq!(params.first("data"), None);
        assert_eq!(params.first("missing"), None);
    }

    #[tokio::test]
    async fn test_operations_before_deploy_never_touch_chain() {
        let chain = SimulatedChain::new();
        let ctx = context(&chain);
        let params: RequestParams = [
            ("data", "5"),
            (
                "hash",
                "0x378674bebd1430d9ce63adc792c573da56e69b8d6c97174c93a43c5991ae0d61",
            ),
        ]
        .into_iter()
        .collect();

        for op in [Operation::Get, Operation::Set, Operation::Summary] {
            let outcome = op.invoke(&ctx, &params).await;
            assert_eq!(outcome.status, StatusCode::BAD_REQUEST, "{:?}", op);
            assert!(outcome.error.is_none());
        }
        assert_eq!(chain.total_calls(), 0);
        assert_eq!(chain.calls(Stage::Fetch), 0);
    }

    #[tokio::test]
    async fn test_full_scenario() {
        let chain = SimulatedChain::new();
        let ctx = context(&chain);
        let none = RequestParams::default();

        let deployed = Operation::Deploy.invoke(&ctx, &none).await;
        assert!(deployed.is_success(), "{:?}", deployed);

        let set = Operation::Set
            .invoke(&ctx, &[("data", "100")].into_iter().collect())
            .await;
        assert!(set.is_success());
        let hash = set
            .body
            .strip_prefix("Hash of Transaction for Set: ")
            .unwrap()
            .to_string();

        let get = Operation::Get.invoke(&ctx, &none).await;
        assert_eq!(get.body, "Stored value: 100");

        let summary = Operation::Summary
            .invoke(&ctx, &[("hash", hash.as_str())].into_iter().collect())
            .await;
        assert!(summary.body.starts_with("Transaction pending? false; details: TX("));
    }
}
