#![allow(missing_docs)]

//! Storage Gateway - HTTP front-end over a single on-chain storage contract.
//!
//! The gateway deploys a minimal storage contract (`get()` / `set(uint256)`)
//! to a Quorum/Ethereum node and exposes four query-string driven routes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        STORAGE GATEWAY                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐            ┌─────────────┐            │
//! │  │  HTTP  (Port 8080)   │            │    Admin    │            │
//! │  │ /deploy /get /set    │            │  Port 9090  │            │
//! │  │ /summary             │            │ /health     │            │
//! │  └──────────┬───────────┘            │ /metrics    │            │
//! │             │                        └─────────────┘            │
//! │  ┌──────────┴───────────────────────┐                           │
//! │  │   CatchPanic → Tracing (span)    │                           │
//! │  └──────────┬───────────────────────┘                           │
//! │             │                                                   │
//! │  ┌──────────┴───────────────────────┐                           │
//! │  │  Dispatcher (Outcome → response) │                           │
//! │  └──────────┬───────────────────────┘                           │
//! │             │                                                   │
//! │  ┌──────────┴───────────────────────┐                           │
//! │  │  Service Context                 │                           │
//! │  │  (ArcSwap'd Session+Connection)  │                           │
//! │  └──────────┬───────────────────────┘                           │
//! └─────────────┼───────────────────────────────────────────────────┘
//!               │ ChainConnector / ChainConnection
//!       ┌───────┴────────┐
//!       ▼                ▼
//!   JSON-RPC node    Simulated chain
//!   (HTTP or IPC)    (tests, demo)
//! ```
//!
//! # Routes
//!
//! - `/deploy`: deploy a new contract and make it the live deployment
//! - `/get`: read the stored value
//! - `/set?data=N`: submit `set(N)` and return the transaction hash
//! - `/summary?hash=0x..`: pending flag and details of a transaction
//!
//! Validation failures answer 400 with the detail. Chain failures answer 500
//! with a fixed headline; the detail only goes to the log.
//!
//! # Usage
//!
//! ```ignore
//! use storage_gateway::{GatewayConfig, GatewayService, RpcConnector};
//!
//! let config = GatewayConfig::default();
//! let connector = Arc::new(RpcConnector::new(config.timeouts.chain_call));
//! let mut service = GatewayService::new(config, connector)?;
//! service.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod context;
pub mod demo;
pub mod domain;
pub mod middleware;
pub mod operations;
pub mod ports;
pub mod router;
pub mod service;

// Re-exports for public API
pub use adapters::{RpcConnector, SimulatedChain};
pub use context::{ContextSettings, Deployment, ServiceContext};
pub use demo::{run_demo, DemoError, DemoReport};
pub use domain::config::GatewayConfig;
pub use domain::error::{ChainError, DeployError, GatewayError, OperationError};
pub use domain::types::*;
pub use middleware::GatewayMetrics;
pub use operations::{Operation, Outcome, RequestParams};
pub use service::GatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
