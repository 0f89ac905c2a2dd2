//! Adapters for the storage gateway.
//!
//! Chain client implementations behind the ports: a JSON-RPC node client and
//! an in-process simulated chain.

pub mod rpc;
pub mod simulated;

pub use rpc::{RpcConnection, RpcConnector};
pub use simulated::{SimulatedChain, Stage};
