//! JSON-RPC chain client for Ethereum/Quorum nodes.

pub mod connection;
pub mod contract;

pub use connection::{RpcConnection, RpcConnector};
