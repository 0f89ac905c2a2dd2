//! Per-operation request metrics, exposed as JSON on the admin server.

use crate::operations::Operation;
use axum::http::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one operation
#[derive(Default)]
pub struct OperationMetrics {
    pub requests: AtomicU64,
    pub successes: AtomicU64,
    pub client_errors: AtomicU64,
    pub server_errors: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

impl OperationMetrics {
    fn to_json(&self) -> serde_json::Value {
        let requests = self.requests.load(Ordering::Relaxed);
        let latency = self.total_latency_ms.load(Ordering::Relaxed);
        serde_json::json!({
            "requests": requests,
            "successes": self.successes.load(Ordering::Relaxed),
            "client_errors": self.client_errors.load(Ordering::Relaxed),
            "server_errors": self.server_errors.load(Ordering::Relaxed),
            "average_latency_ms": if requests == 0 { 0.0 } else { latency as f64 / requests as f64 },
        })
    }
}

/// Gateway metrics
#[derive(Default)]
pub struct GatewayMetrics {
    deploy: OperationMetrics,
    get: OperationMetrics,
    set: OperationMetrics,
    summary: OperationMetrics,

    /// Successful deploys (installed deployments)
    pub deployments: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(&self, operation: Operation) -> &OperationMetrics {
        match operation {
            Operation::Deploy => &self.deploy,
            Operation::Get => &self.get,
            Operation::Set => &self.set,
            Operation::Summary => &self.summary,
        }
    }

    /// Record a finished request
    pub fn record(&self, operation: Operation, status: StatusCode, latency_ms: u64) {
        let m = self.operation(operation);
        m.requests.fetch_add(1, Ordering::Relaxed);
        m.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        if status.is_success() {
            m.successes.fetch_add(1, Ordering::Relaxed);
            if operation == Operation::Deploy {
                self.deployments.fetch_add(1, Ordering::Relaxed);
            }
        } else if status.is_client_error() {
            m.client_errors.fetch_add(1, Ordering::Relaxed);
        } else if status.is_server_error() {
            m.server_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Total requests across all operations
    pub fn total_requests(&self) -> u64 {
        Operation::ALL
            .iter()
            .map(|op| self.operation(*op).requests.load(Ordering::Relaxed))
            .sum()
    }

    /// Export metrics as JSON
    pub fn snapshot(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for op in Operation::ALL {
            map.insert(op.name().to_string(), self.operation(op).to_json());
        }
        map.insert(
            "deployments".to_string(),
            self.deployments.load(Ordering::Relaxed).into(),
        );
        map.insert("total_requests".to_string(), self.total_requests().into());
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_classifies_status() {
        let metrics = GatewayMetrics::new();
        metrics.record(Operation::Set, StatusCode::OK, 10);
        metrics.record(Operation::Set, StatusCode::BAD_REQUEST, 0);
        metrics.record(Operation::Set, StatusCode::INTERNAL_SERVER_ERROR, 20);

        let set = metrics.operation(Operation::Set);
        assert_eq!(set.requests.load(Ordering::Relaxed), 3);
        assert_eq!(set.successes.load(Ordering::Relaxed), 1);
        assert_eq!(set.client_errors.load(Ordering::Relaxed), 1);
        assert_eq!(set.server_errors.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_requests(), 3);
    }

    #[test]
    fn test_snapshot() {
        let metrics = GatewayMetrics::new();
        metrics.record(Operation::Deploy, StatusCode::OK, 100);
        metrics.record(Operation::Get, StatusCode::OK, 2);

        let json = metrics.snapshot();
        assert_eq!(json["deployments"], 1);
        assert_eq!(json["total_requests"], 2);
        assert_eq!(json["deploy"]["average_latency_ms"], 100.0);
        assert_eq!(json["summary"]["requests"], 0);
    }
}
