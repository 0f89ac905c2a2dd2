//! Error taxonomy for chain access, deployment and request operations.
//!
//! Validation rejections (missing or malformed query parameters, calls made
//! before a deployment exists) are not errors; they are expressed as an
//! `Outcome` without an error object by the dispatcher.

use super::types::Hash;
use std::time::Duration;

/// Failure reported by the chain client.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The node endpoint could not be reached or did not answer the handshake
    #[error("connection failed: {0}")]
    Connection(String),

    /// Credential material was rejected or could not be decrypted
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The contract-creation transaction was rejected
    #[error("deployment rejected: {0}")]
    Deployment(String),

    /// A contract handle could not be bound to the given address
    #[error("cannot bind contract: {0}")]
    Binding(String),

    /// A read-only contract call failed or returned malformed data
    #[error("contract call failed: {0}")]
    Call(String),

    /// A state-changing transaction could not be signed or submitted
    #[error("transaction failed: {0}")]
    Transact(String),

    /// The node has no record of the transaction
    #[error("transaction 0x{0:x} not found")]
    NotFound(Hash),

    /// JSON-RPC error object returned by the node
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Transport-level failure (HTTP, socket, framing)
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not complete in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of the deploy sequence, classified by the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("failed to connect to the chain node: {0}")]
    Connection(#[source] ChainError),

    #[error("failed to create authorized transactor: {0}")]
    Authorization(#[source] ChainError),

    #[error("failed to deploy new storage contract: {0}")]
    Deployment(#[source] ChainError),

    #[error("failed to get contract handle: {0}")]
    HandleResolution(#[source] ChainError),

    /// The whole sequence exceeded the deploy timeout
    #[error("deploy sequence timed out after {0:?}")]
    Timeout(Duration),
}

impl DeployError {
    /// Fixed headline describing the failed stage, safe to show to clients.
    pub fn headline(&self) -> &'static str {
        match self {
            DeployError::Connection(_) => "Failed to connect to the Ethereum client",
            DeployError::Authorization(_) => "Failed to create authorized transactor",
            DeployError::Deployment(_) => "Failed to deploy new storage contract",
            DeployError::HandleResolution(_) => "Failed to get contract handle",
            DeployError::Timeout(_) => "Failed to deploy new storage contract",
        }
    }

    /// Short stage label used in logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            DeployError::Connection(_) => "connect",
            DeployError::Authorization(_) => "authorize",
            DeployError::Deployment(_) => "deploy",
            DeployError::HandleResolution(_) => "bind",
            DeployError::Timeout(_) => "timeout",
        }
    }
}

/// Failure of a request operation after validation passed.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("get() call failed: {0}")]
    Call(#[source] ChainError),

    #[error("set() transaction failed: {0}")]
    Transact(#[source] ChainError),

    #[error("transaction lookup failed: {0}")]
    Fetch(#[source] ChainError),
}

/// Gateway-level errors (process lifecycle, not per-request)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Server terminated with an I/O error
    #[error("server error: {0}")]
    Serve(String),
}
