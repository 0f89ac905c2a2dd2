//! Ports for the storage gateway.
//!
//! The core only talks to the chain through these traits.

pub mod chain;

pub use chain::{Authorization, ChainConnection, ChainConnector, Connection, DeployedContract};
