//! Middleware for the storage gateway.

pub mod metrics;
pub mod tracing;

pub use self::metrics::{GatewayMetrics, OperationMetrics};
pub use self::tracing::{TracingLayer, REQUEST_ID_HEADER};
